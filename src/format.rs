//! Entity serialization for notification payloads.

use crate::error::Result;
use sensorthings_types::Entity;
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;

/// Serializes an entity, optionally restricted to a set of wire names.
pub trait EntityFormatter: Send + Sync {
    fn write_entity(
        &self,
        entity: &Entity,
        select: Option<&BTreeSet<String>>,
        service_root_url: &str,
    ) -> Result<String>;
}

/// JSON output in the SensorThings layout: `@iot.id`, `@iot.selfLink`, plain
/// properties, then `<Link>@iot.navigationLink` entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl EntityFormatter for JsonFormatter {
    fn write_entity(
        &self,
        entity: &Entity,
        select: Option<&BTreeSet<String>>,
        service_root_url: &str,
    ) -> Result<String> {
        let selected = |name: &str| select.is_none_or(|s| s.contains(name));
        let root = service_root_url.trim_end_matches('/');
        let self_link = entity
            .id()
            .map(|id| format!("{}/{}({})", root, entity.entity_type().plural(), id));

        let mut out = Map::new();
        if let Some(id) = entity.id()
            && selected("@iot.id")
        {
            out.insert("@iot.id".to_string(), serde_json::to_value(id)?);
        }
        if let Some(link) = &self_link
            && selected("@iot.selfLink")
        {
            out.insert("@iot.selfLink".to_string(), Json::String(link.clone()));
        }
        for (property, value) in entity.properties() {
            let name = property.wire_name();
            if selected(name) {
                out.insert(name.to_string(), serde_json::to_value(value)?);
            }
        }
        if let Some(link) = &self_link {
            for nav in entity.entity_type().navigation_properties() {
                if selected(nav.name()) {
                    out.insert(
                        format!("{}@iot.navigationLink", nav.name()),
                        Json::String(format!("{}/{}", link, nav.name())),
                    );
                }
            }
        }

        let json = Json::Object(out);
        let text = if self.pretty {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        };
        Ok(text)
    }
}
