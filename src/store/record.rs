use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry in a tracked collection.
///
/// Properties are kept as raw JSON; the accessors below encapsulate the
/// nested lookups and return `None` for any missing or mistyped level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Record {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// `properties.<name>.select.name`
    pub fn select_name(&self, name: &str) -> Option<&str> {
        self.property(name)?.get("select")?.get("name")?.as_str()
    }

    /// `properties.<name>.number`
    pub fn number(&self, name: &str) -> Option<f64> {
        self.property(name)?.get("number")?.as_f64()
    }

    /// `properties.<name>.formula.number`
    pub fn formula_number(&self, name: &str) -> Option<f64> {
        self.property(name)?.get("formula")?.get("number")?.as_f64()
    }

    /// Normalized asset symbol held in a select property; blank counts as absent.
    pub fn symbol(&self, name: &str) -> Option<String> {
        let symbol = self.select_name(name)?.trim();
        (!symbol.is_empty()).then(|| symbol.to_uppercase())
    }
}

/// One page of a collection query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<Record>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn reads_nested_properties() {
        let r = record(json!({
            "id": "page-1",
            "parent": { "type": "database_id", "database_id": "db-1" },
            "properties": {
                "Coin": { "select": { "name": "btc" } },
                "Price": { "number": 42000.5 },
                "Total": { "formula": { "type": "number", "number": 84001.0 } }
            }
        }));

        assert_eq!(r.select_name("Coin"), Some("btc"));
        assert_eq!(r.symbol("Coin").as_deref(), Some("BTC"));
        assert_eq!(r.number("Price"), Some(42000.5));
        assert_eq!(r.formula_number("Total"), Some(84001.0));
    }

    #[test]
    fn missing_levels_yield_none() {
        let r = record(json!({
            "id": "page-2",
            "properties": {
                "Coin": { "select": null },
                "Price": { "number": null },
                "Total": { "number": 10 }
            }
        }));

        assert_eq!(r.select_name("Coin"), None);
        assert_eq!(r.symbol("Coin"), None);
        assert_eq!(r.number("Price"), None);
        assert_eq!(r.formula_number("Total"), None);
        assert_eq!(r.select_name("Stock"), None);
    }

    #[test]
    fn blank_symbol_is_absent() {
        let r = record(json!({
            "id": "page-3",
            "properties": { "Coin": { "select": { "name": "  " } } }
        }));
        assert_eq!(r.symbol("Coin"), None);
    }

    #[test]
    fn query_page_defaults_when_fields_missing() {
        let page: QueryPage = serde_json::from_value(json!({ "results": [] })).unwrap();
        assert!(page.results.is_empty());
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }
}
