//! A WEBSOCKET counterpart to `hello_world_server.rs`: registers one
//! upgrade route backed by the crate's reference `EchoApp` and otherwise
//! drives the same bare scheduler loop.

extern crate cohttp;
extern crate env_logger;

use cohttp::{Router, Server, ServerConfig};
use std::net::SocketAddr;
use std::thread::sleep;
use std::time::Duration;

fn main() {
    env_logger::init();

    let mut router = Router::new();
    router
        .add_ws_route("/echo", Box::new(|_request, _captures| Box::new(cohttp::ws::EchoApp) as Box<dyn cohttp::ws::WsApp>))
        .expect("route pattern is valid");

    let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
    let mut server = Server::bind(addr, router, ServerConfig::default()).expect("bind");
    println!("listening on {}", addr);

    loop {
        let report = server.turn();
        if !report.accepted && report.active_connections == 0 {
            sleep(Duration::from_millis(5));
        }
    }
}
