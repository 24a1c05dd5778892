use crate::route::{PathParams, Route};
use http::Method;

/// A matched route with the parameters captured from the path.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// Position of the route in the table.
    pub index: usize,
    /// The matched route.
    pub route: &'a Route,
    /// Captured `:param` values.
    pub params: PathParams,
}

/// An ordered set of routes. The first route that accepts a request wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route. Earlier routes take precedence.
    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Finds the first route accepting `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .enumerate()
            .find_map(|(index, route)| {
                route.matches(method, path).map(|params| RouteMatch {
                    index,
                    route,
                    params,
                })
            })
    }

    /// Iterates over routes in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<Route> for RouteTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

impl Extend<Route> for RouteTable {
    fn extend<I: IntoIterator<Item = Route>>(&mut self, iter: I) {
        self.routes.extend(iter);
    }
}
