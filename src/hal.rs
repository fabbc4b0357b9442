//! HAL link helpers

use serde_json::Value;

/// `_links.<rel>.href` of a HAL resource
pub fn link<'a>(resource: &'a Value, rel: &str) -> Option<&'a str> {
    resource
        .get("_links")?
        .get(rel)?
        .get("href")?
        .as_str()
}

/// `_links.self.href`: the canonical URL of a HAL resource
pub fn self_href(resource: &Value) -> Option<&str> {
    link(resource, "self")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_self_href() {
        let coupon = json!({
            "_links": {
                "self": {"href": "https://api/coupons/7"},
                "fx:codes": {"href": "https://api/coupons/7/codes"}
            },
            "name": "Spring"
        });
        assert_eq!(self_href(&coupon), Some("https://api/coupons/7"));
        assert_eq!(link(&coupon, "fx:codes"), Some("https://api/coupons/7/codes"));
        assert_eq!(link(&coupon, "missing"), None);
        assert_eq!(self_href(&json!({"id": 1})), None);
    }
}
