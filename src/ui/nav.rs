use serde::Serialize;

/// Icon rendered by the dashboard's icon component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconComponent {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavBadge {
    pub color: String,
    pub text: String,
}

/// One entry of the dashboard side menu.
///
/// Serialized in camelCase to match the menu data the front end renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_component: Option<IconComponent>,
    /// CSS icon class, used by nested entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<NavBadge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
}

impl NavItem {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            icon_component: None,
            icon: None,
            badge: None,
            children: Vec::new(),
        }
    }

    pub fn with_icon_component(mut self, name: impl Into<String>) -> Self {
        self.icon_component = Some(IconComponent { name: name.into() });
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_badge(mut self, color: impl Into<String>, text: impl Into<String>) -> Self {
        self.badge = Some(NavBadge {
            color: color.into(),
            text: text.into(),
        });
        self
    }

    pub fn with_children(mut self, children: Vec<NavItem>) -> Self {
        self.children = children;
        self
    }

    /// This entry's URL followed by those of all descendants
    #[cfg(test)]
    pub fn urls(&self) -> Vec<&str> {
        let mut urls = vec![self.url.as_str()];
        for child in &self.children {
            urls.extend(child.urls());
        }
        urls
    }
}

/// The dashboard side menu
pub fn nav_items() -> Vec<NavItem> {
    vec![
        NavItem::new("Dashboard", "/dashboard")
            .with_icon_component("cil-speedometer")
            .with_badge("info", "NEW"),
        NavItem::new("Application Management", "/chat-bot")
            .with_icon_component("cil-star")
            .with_children(vec![
                NavItem::new("Document Upload", "/upload").with_icon("nav-icon-bullet"),
                NavItem::new("Bot", "/chat-bot").with_icon("nav-icon-bullet"),
            ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::is_client_route;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let items = serde_json::to_value(nav_items()).unwrap();
        assert_eq!(
            items[0],
            json!({
                "name": "Dashboard",
                "url": "/dashboard",
                "iconComponent": { "name": "cil-speedometer" },
                "badge": { "color": "info", "text": "NEW" }
            })
        );
        assert_eq!(items[1]["children"][0]["name"], "Document Upload");
        assert_eq!(items[1]["children"][0]["icon"], "nav-icon-bullet");
        assert!(items[1]["children"][0].get("children").is_none());
    }

    #[test]
    fn test_every_menu_url_is_routable() {
        for item in nav_items() {
            for url in item.urls() {
                assert!(is_client_route(url), "{} has no dashboard route", url);
            }
        }
    }
}
