//! Route table (C4).
//!
//! Routes are registered explicitly via [`Router::add_route`] — no
//! decorator macros, an explicit builder over attribute magic. Matching is
//! a linear scan in
//! registration order against an anchored, full-path [`Regex`]; the first
//! match wins. No match synthesizes a 404 (§6).

use crate::error::HandlerError;
use crate::method::Method;
use crate::request::Request;
use crate::response::{synthesize, Response};
use crate::ws::WsApp;
use regex::Regex;

/// What a handler hands back to the connection driving it.
pub enum HandlerOutcome {
    /// A complete response, ready to be written.
    Response(Response),
    /// A resumable computation that eventually produces a response. Used
    /// by handlers that need to do their own bounded work (e.g. reading
    /// further from a slow backing store) before they can answer — a
    /// handler returns either a response or a step-producer, never mixing
    /// the two in one call. A failure here is the `HandlerError` kind from
    /// §7: logged and fatal to this one connection, never to the scheduler.
    Deferred(Box<dyn Poll<Output = Response, Error = HandlerError>>),
}

/// A handler receives the matched request and the regex capture groups
/// from the route pattern, in order.
pub type Handler = Box<dyn Fn(&Request, &[String]) -> HandlerOutcome>;

/// A WEBSOCKET route's handler builds the per-connection app that will
/// drive the open socket — the `(path, headers, ws) -> generator-of-steps`
/// shape from §3, reified as a [`WsApp`] factory (see `ws` module docs).
pub type WsFactory = Box<dyn Fn(&Request, &[String]) -> Box<dyn WsApp>>;

struct Route {
    method: Method,
    pattern: Regex,
    handler: Handler,
}

struct WsRoute {
    pattern: Regex,
    factory: WsFactory,
}

/// The route table. Built once at startup via [`Router::add_route`] and
/// [`Router::add_ws_route`], then consulted read-only for the lifetime of
/// the server.
pub struct Router {
    routes: Vec<Route>,
    ws_routes: Vec<WsRoute>,
}

impl Router {
    pub fn new() -> Router {
        Router { routes: Vec::new(), ws_routes: Vec::new() }
    }

    /// Registers a route. `pattern` is anchored automatically if the
    /// caller didn't anchor it themselves (`^...$` wrapping), so route
    /// authors write plain fragments like `/users/(\d+)`.
    pub fn add_route(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<(), regex::Error> {
        let anchored = anchor(pattern);
        let regex = Regex::new(&anchored)?;
        self.routes.push(Route { method, pattern: regex, handler });
        Ok(())
    }

    /// Registers a WEBSOCKET route, matched against the effective method
    /// produced by upgrade detection rather than a literal method token.
    pub fn add_ws_route(&mut self, pattern: &str, factory: WsFactory) -> Result<(), regex::Error> {
        let anchored = anchor(pattern);
        let regex = Regex::new(&anchored)?;
        self.ws_routes.push(WsRoute { pattern: regex, factory });
        Ok(())
    }

    /// Finds the first route whose method tag and path pattern both match
    /// and dispatches to it. A path match with a different method is
    /// indistinguishable from no match at all — no `405` is emitted, per
    /// the deliberate simplicity trade in §4.4. Synthesizes a 404 when
    /// nothing matches. Never consulted for a request whose effective
    /// method is `Websocket`; use [`Router::dispatch_ws`] for those.
    pub fn dispatch_http(&self, request: &Request) -> HandlerOutcome {
        let effective_method = request.effective_method();
        for route in &self.routes {
            if Some(route.method) != effective_method {
                continue;
            }
            if let Some(captures) = route.pattern.captures(&request.path) {
                let groups: Vec<String> = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return (route.handler)(request, &groups);
            }
        }
        HandlerOutcome::Response(synthesize(404, "Not Found"))
    }

    /// Finds the first WEBSOCKET route matching `request.path` and builds
    /// its app. `None` means no route matched (the caller should respond
    /// 404, same as the HTTP path).
    pub fn dispatch_ws(&self, request: &Request) -> Option<Box<dyn WsApp>> {
        for route in &self.ws_routes {
            if let Some(captures) = route.pattern.captures(&request.path) {
                let groups: Vec<String> = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some((route.factory)(request, &groups));
            }
        }
        None
    }
}

impl Default for Router {
    fn default() -> Router {
        Router::new()
    }
}

fn anchor(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    if !pattern.starts_with('^') {
        out.push('^');
    }
    out.push_str(pattern);
    if !pattern.ends_with('$') {
        out.push('$');
    }
    out
}

/// Re-exported so handlers that return [`HandlerOutcome::Deferred`] don't
/// need a direct dependency on the step module's internals.
pub use crate::step::Poll;
