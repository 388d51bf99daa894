//! Request routing rules registered on a browsing context.

use serde::Serialize;
use url::Url;

/// Hosts whose requests are aborted when common ad blocking is enabled.
pub const COMMON_AD_HOSTS: &[&str] = &[
    "addthis.com",
    "s7.addthis.com",
    "ugroocuw.net",
    "likedstring.com",
    "dacmaiss.com",
    "rndskittytor.com",
    "uponelectabuzzor.club",
    "pushamir.com",
    "toglooman.com",
    "yxcblckd.com",
    "denetsuk.com",
    "whos.amung.us",
    "ezexfzek.com",
    "wurfl.io",
    "curtainsimplicitycoast.com",
];

/// Resource extensions aborted in optimize mode.
pub const OPTIONAL_RESOURCE_EXTENSIONS: &[&str] = &[
    "css", "jpg", "jpeg", "png", "pdf", "zip", "svg", "gif", "woff",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "matcher", content = "values")]
pub enum RouteMatcher {
    /// Host name contains any of these substrings.
    HostContains(Vec<String>),
    /// Path ends in one of these extensions.
    Extension(Vec<String>),
}

impl RouteMatcher {
    pub fn common_ads() -> Self {
        Self::HostContains(COMMON_AD_HOSTS.iter().map(|host| host.to_string()).collect())
    }

    pub fn optional_resources() -> Self {
        Self::Extension(
            OPTIONAL_RESOURCE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        )
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Self::HostContains(needles) => url
                .host_str()
                .map(|host| needles.iter().any(|needle| host.contains(needle.as_str())))
                .unwrap_or(false),
            Self::Extension(extensions) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|file| file.rsplit_once('.'))
                .map(|(_, ext)| {
                    extensions
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
                })
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub matcher: RouteMatcher,
    pub action: RouteAction,
}

impl Route {
    pub fn abort(matcher: RouteMatcher) -> Self {
        Self {
            matcher,
            action: RouteAction::Abort,
        }
    }
}

/// What happens to a request after routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "decision", content = "route")]
pub enum RouteDecision {
    Continue,
    /// Aborted by the route at this registration index.
    Aborted(usize),
}

impl RouteDecision {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// First matching route wins; no match lets the request through.
pub fn decide(routes: &[Route], url: &Url) -> RouteDecision {
    routes
        .iter()
        .position(|route| route.matcher.matches(url))
        .map(|index| match routes[index].action {
            RouteAction::Abort => RouteDecision::Aborted(index),
        })
        .unwrap_or(RouteDecision::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn ad_hosts_match_on_host_substring() {
        let ads = RouteMatcher::common_ads();
        assert!(ads.matches(&url("https://s7.addthis.com/js/300/addthis_widget.js")));
        assert!(ads.matches(&url("http://cdn.wurfl.io/wurfl.js")));
        assert!(!ads.matches(&url("https://example.com/addthis.com")));
    }

    #[test]
    fn optional_resources_match_on_extension() {
        let resources = RouteMatcher::optional_resources();
        assert!(resources.matches(&url("https://example.com/static/site.CSS")));
        assert!(resources.matches(&url("https://example.com/img/logo.png?v=2")));
        assert!(!resources.matches(&url("https://example.com/app.js")));
        assert!(!resources.matches(&url("https://example.com/")));
    }

    #[test]
    fn first_matching_route_decides() {
        let routes = vec![
            Route::abort(RouteMatcher::common_ads()),
            Route::abort(RouteMatcher::optional_resources()),
        ];
        assert_eq!(decide(&routes, &url("https://pushamir.com/a.png")), RouteDecision::Aborted(0));
        assert_eq!(decide(&routes, &url("https://example.com/a.png")), RouteDecision::Aborted(1));
        assert_eq!(decide(&routes, &url("https://example.com/")), RouteDecision::Continue);
        assert_eq!(decide(&[], &url("https://pushamir.com/")), RouteDecision::Continue);
    }
}
