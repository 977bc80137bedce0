//! Path-template matching to handler kinds (spec §4.4). Templates are
//! compiled once into an ordered table of segment matchers and evaluated
//! first-match, generalizing the teacher's per-service `RouteConfig` list
//! into one static table for the whole server.

use std::collections::HashMap;

use http::Method;

/// Which dispatcher contract a resolved request should be handled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    SearchStudies,
    SearchSeries,
    SearchInstances,
    SearchSeriesInStudy,
    SearchInstancesInStudy,
    SearchInstancesInSeries,
    RetrieveStudy,
    RetrieveSeries,
    RetrieveInstance,
    RetrieveStudyMetadata,
    RetrieveSeriesMetadata,
    RetrieveInstanceMetadata,
    RetrieveFrames,
    RetrieveRendered,
    RetrieveThumbnail,
    RetrieveBulkdata,
    StoreInstances,
    StoreInstancesInStudy,
    DeleteStudy,
    DeleteSeries,
    DeleteInstance,
    Capabilities,
    CorsPreflight,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
    /// Matches one-or-more trailing segments, joined back with `/` into a
    /// single captured value (used by bulkdata paths).
    Wildcard(&'static str),
}

struct Route {
    method: Method,
    segments: Vec<Segment>,
    kind: HandlerKind,
}

/// The compiled route table, evaluated in declaration order.
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        use HandlerKind::*;
        use Segment::{Literal as L, Param as P, Wildcard as W};

        let routes = vec![
            Route { method: Method::GET, segments: vec![L("studies")], kind: SearchStudies },
            Route { method: Method::GET, segments: vec![L("series")], kind: SearchSeries },
            Route { method: Method::GET, segments: vec![L("instances")], kind: SearchInstances },
            Route {
                method: Method::GET,
                segments: vec![L("studies"), P("studyUID"), L("series")],
                kind: SearchSeriesInStudy,
            },
            Route {
                method: Method::GET,
                segments: vec![L("studies"), P("studyUID"), L("instances")],
                kind: SearchInstancesInStudy,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                ],
                kind: SearchInstancesInSeries,
            },
            Route {
                method: Method::GET,
                segments: vec![L("studies"), P("studyUID"), L("metadata")],
                kind: RetrieveStudyMetadata,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("metadata"),
                ],
                kind: RetrieveSeriesMetadata,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                    L("metadata"),
                ],
                kind: RetrieveInstanceMetadata,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                    L("frames"),
                    P("frameList"),
                ],
                kind: RetrieveFrames,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                    L("rendered"),
                ],
                kind: RetrieveRendered,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                    L("thumbnail"),
                ],
                kind: RetrieveThumbnail,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                    L("bulkdata"),
                    W("bulkdataPath"),
                ],
                kind: RetrieveBulkdata,
            },
            Route {
                method: Method::GET,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                ],
                kind: RetrieveInstance,
            },
            Route {
                method: Method::GET,
                segments: vec![L("studies"), P("studyUID"), L("series"), P("seriesUID")],
                kind: RetrieveSeries,
            },
            Route {
                method: Method::GET,
                segments: vec![L("studies"), P("studyUID")],
                kind: RetrieveStudy,
            },
            Route {
                method: Method::POST,
                segments: vec![L("studies"), P("studyUID")],
                kind: StoreInstancesInStudy,
            },
            Route {
                method: Method::POST,
                segments: vec![L("studies")],
                kind: StoreInstances,
            },
            Route {
                method: Method::DELETE,
                segments: vec![
                    L("studies"),
                    P("studyUID"),
                    L("series"),
                    P("seriesUID"),
                    L("instances"),
                    P("instanceUID"),
                ],
                kind: DeleteInstance,
            },
            Route {
                method: Method::DELETE,
                segments: vec![L("studies"), P("studyUID"), L("series"), P("seriesUID")],
                kind: DeleteSeries,
            },
            Route {
                method: Method::DELETE,
                segments: vec![L("studies"), P("studyUID")],
                kind: DeleteStudy,
            },
            Route {
                method: Method::GET,
                segments: vec![L("capabilities")],
                kind: Capabilities,
            },
        ];

        Self { routes }
    }

    /// Resolves `method`/`path` (with `path_prefix` already stripped by the
    /// caller) to a handler kind and its captured path parameters. OPTIONS
    /// always resolves to [`HandlerKind::CorsPreflight`] regardless of path,
    /// per spec §4.4.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(HandlerKind, HashMap<String, String>)> {
        if method == Method::OPTIONS {
            return Some((HandlerKind::CorsPreflight, HashMap::new()));
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for route in &self.routes {
            if &route.method != method {
                continue;
            }
            if let Some(params) = match_segments(&route.segments, &segments) {
                return Some((route.kind, params));
            }
        }
        None
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> Option<HashMap<String, String>> {
    let mut params = HashMap::new();
    let mut pi = 0usize;
    for (i, segment) in pattern.iter().enumerate() {
        match segment {
            Segment::Wildcard(name) => {
                if pi > path.len() {
                    return None;
                }
                let rest = path.get(pi..)?;
                if rest.is_empty() {
                    return None;
                }
                params.insert(name.to_string(), rest.join("/"));
                return if i == pattern.len() - 1 { Some(params) } else { None };
            }
            Segment::Literal(lit) => {
                if path.get(pi) != Some(lit) {
                    return None;
                }
                pi += 1;
            }
            Segment::Param(name) => {
                let value = path.get(pi)?;
                params.insert(name.to_string(), value.to_string());
                pi += 1;
            }
        }
    }
    if pi == path.len() {
        Some(params)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_search_studies() {
        let router = Router::new();
        let (kind, params) = router.resolve(&Method::GET, "/studies").unwrap();
        assert_eq!(kind, HandlerKind::SearchStudies);
        assert!(params.is_empty());
    }

    #[test]
    fn resolves_retrieve_instance_with_params() {
        let router = Router::new();
        let (kind, params) = router
            .resolve(&Method::GET, "/studies/1.2.3/series/1.2.3.1/instances/1.2.3.1.1")
            .unwrap();
        assert_eq!(kind, HandlerKind::RetrieveInstance);
        assert_eq!(params.get("studyUID"), Some(&"1.2.3".to_string()));
        assert_eq!(params.get("seriesUID"), Some(&"1.2.3.1".to_string()));
        assert_eq!(params.get("instanceUID"), Some(&"1.2.3.1.1".to_string()));
    }

    #[test]
    fn metadata_is_matched_before_plain_retrieve() {
        let router = Router::new();
        let (kind, _) = router.resolve(&Method::GET, "/studies/1.2.3/metadata").unwrap();
        assert_eq!(kind, HandlerKind::RetrieveStudyMetadata);
    }

    #[test]
    fn options_is_always_cors_preflight() {
        let router = Router::new();
        let (kind, _) = router.resolve(&Method::OPTIONS, "/studies/anything/at/all").unwrap();
        assert_eq!(kind, HandlerKind::CorsPreflight);
    }

    #[test]
    fn delete_distinguishes_levels() {
        let router = Router::new();
        let (kind, _) = router.resolve(&Method::DELETE, "/studies/1.2.3").unwrap();
        assert_eq!(kind, HandlerKind::DeleteStudy);
        let (kind, _) = router
            .resolve(&Method::DELETE, "/studies/1.2.3/series/1.2.3.1")
            .unwrap();
        assert_eq!(kind, HandlerKind::DeleteSeries);
    }

    #[test]
    fn unmatched_path_returns_none() {
        let router = Router::new();
        assert!(router.resolve(&Method::GET, "/not-a-real-path").is_none());
    }
}
