//! Minimal binary that stands up one route and drives the scheduler in a
//! loop. There is no reactor to hand control to, so the host loop *is* the
//! event loop: each iteration calls `turn()` once and sleeps briefly when
//! nothing happened.

extern crate cohttp;
extern crate env_logger;

use cohttp::route::HandlerOutcome;
use cohttp::{Method, Router, Server, ServerConfig};
use std::net::SocketAddr;
use std::thread::sleep;
use std::time::Duration;

fn main() {
    env_logger::init();

    let mut router = Router::new();
    router
        .add_route(
            Method::Get,
            "/",
            Box::new(|_request, _captures| HandlerOutcome::Response(cohttp::Response::text(200, "OK", "Hello, world!"))),
        )
        .expect("route pattern is valid");

    let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    let mut server = Server::bind(addr, router, ServerConfig::default()).expect("bind");
    println!("listening on {}", addr);

    loop {
        let report = server.turn();
        if !report.accepted && report.active_connections == 0 {
            sleep(Duration::from_millis(5));
        }
    }
}
