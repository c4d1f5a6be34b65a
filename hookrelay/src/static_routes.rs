/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Permanent routes read from configuration at startup.

use crate::data_plane::fan_out::FanOut;
use crate::delivery::Sink;
use crate::observability::events;
use crate::router::{RouterError, RouterHandle};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const COMPONENT: &str = "static_routes";
const ENTRY_SEPARATOR: char = ',';
const PAIR_SEPARATOR: char = ':';

/// One `secret:label` entry. The secret is the path; the label is informational.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticRoute {
    pub secret: String,
    pub label: String,
}

impl StaticRoute {
    /// Request path served by this route: `/` followed by the secret.
    pub fn path(&self) -> String {
        format!("/{}", self.secret)
    }
}

/// Parses a comma-separated list of `secret:label` pairs.
///
/// Entries without a `:` or with an empty secret are skipped.
pub fn parse_static_routes(config: &str) -> Vec<StaticRoute> {
    config
        .split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let Some((secret, label)) = entry.split_once(PAIR_SEPARATOR) else {
                warn!(
                    event = events::STATIC_ROUTE_SKIP_MALFORMED,
                    component = COMPONENT,
                    "static route entry has no ':' separator; skipping"
                );
                return None;
            };
            let secret = secret.trim();
            if secret.is_empty() {
                warn!(
                    event = events::STATIC_ROUTE_SKIP_EMPTY,
                    component = COMPONENT,
                    label = label.trim(),
                    "static route has an empty secret; skipping"
                );
                return None;
            }
            Some(StaticRoute {
                secret: secret.to_string(),
                label: label.trim().to_string(),
            })
        })
        .collect()
}

/// Registers every route against one shared fan-out over `sinks`.
///
/// Returns the fan-out task, or `None` when there is nothing to install.
pub async fn install_static_routes(
    router: &RouterHandle,
    routes: &[StaticRoute],
    sinks: Vec<Sink>,
) -> Result<Option<JoinHandle<()>>, RouterError> {
    if routes.is_empty() {
        return Ok(None);
    }

    let (fan_out, task) = FanOut::new(sinks).spawn();
    for route in routes {
        router.register(route.path(), fan_out.clone()).await?;
        // The secret is a bearer credential; only the label is logged.
        info!(
            event = events::STATIC_ROUTE_INSTALL,
            component = COMPONENT,
            label = route.label.as_str(),
            "static route installed"
        );
    }
    Ok(Some(task))
}

#[cfg(test)]
mod tests {
    use super::{install_static_routes, parse_static_routes, StaticRoute};
    use crate::delivery::{ingestion_channel, sink_channel, Delivery};
    use crate::router::Router;
    use std::time::Duration;
    use tokio::time::timeout;

    fn route(secret: &str, label: &str) -> StaticRoute {
        StaticRoute {
            secret: secret.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn parses_pairs_and_builds_paths() {
        let routes = parse_static_routes("abc123:github,def456:stripe");

        assert_eq!(
            routes,
            vec![route("abc123", "github"), route("def456", "stripe")]
        );
        assert_eq!(routes[0].path(), "/abc123");
    }

    #[test]
    fn skips_malformed_and_empty_entries() {
        let routes = parse_static_routes("nolabel, :orphan,,good:ok , also:");

        assert_eq!(routes, vec![route("good", "ok"), route("also", "")]);
    }

    #[test]
    fn empty_config_yields_no_routes() {
        assert!(parse_static_routes("").is_empty());
        assert!(parse_static_routes("  ,  ").is_empty());
    }

    #[test]
    fn label_may_contain_separator() {
        let routes = parse_static_routes("s3cr3t:team:alerts");

        assert_eq!(routes, vec![route("s3cr3t", "team:alerts")]);
    }

    #[tokio::test]
    async fn static_route_fans_out_to_every_sink() {
        let (ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (first, mut first_rx) = sink_channel();
        let (second, mut second_rx) = sink_channel();
        let routes = parse_static_routes("abc:one,def:two");
        let task = install_static_routes(&handle, &routes, vec![first, second])
            .await
            .unwrap();
        assert!(task.is_some());
        assert_eq!(handle.routes().await.unwrap(), vec!["/abc", "/def"]);

        ingress.send(Delivery::new("/abc", "x")).await.unwrap();
        ingress.send(Delivery::new("/def", "y")).await.unwrap();

        for rx in [&mut first_rx, &mut second_rx] {
            let x = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
            let y = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
            assert_eq!(&x.payload[..], b"x");
            assert_eq!(&y.payload[..], b"y");
        }
    }

    #[tokio::test]
    async fn nothing_installed_without_routes() {
        let (_ingress, ingress_rx) = ingestion_channel();
        let (router, handle) = Router::new(ingress_rx);
        tokio::spawn(router.run());

        let (sink, _rx) = sink_channel();
        let task = install_static_routes(&handle, &[], vec![sink]).await.unwrap();

        assert!(task.is_none());
        assert!(handle.routes().await.unwrap().is_empty());
    }
}
