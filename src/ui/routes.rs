use serde::Serialize;

/// A page of the dashboard's client-side router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardRoute {
    pub path: &'static str,
    pub view: &'static str,
    pub title: &'static str,
}

pub const DASHBOARD_ROUTES: &[DashboardRoute] = &[
    DashboardRoute {
        path: "/dashboard",
        view: "dashboard",
        title: "Dashboard",
    },
    DashboardRoute {
        path: "/upload",
        view: "upload",
        title: "Document Upload",
    },
    DashboardRoute {
        path: "/chat-bot",
        view: "chat-bot",
        title: "Bot",
    },
];

/// Route owning `path`, including nested paths such as `/upload/recent`
pub fn find_route(path: &str) -> Option<&'static DashboardRoute> {
    let path = path.trim_end_matches('/');
    DASHBOARD_ROUTES.iter().find(|route| {
        path == route.path
            || path
                .strip_prefix(route.path)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Whether the front end's router handles `path`
pub fn is_client_route(path: &str) -> bool {
    path.trim_end_matches('/').is_empty() || find_route(path).is_some()
}
