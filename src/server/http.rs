//! HTTP-транспорт на tiny_http: поток на запрос, всё остальное - в Dispatcher.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tiny_http::{Header, Request, Response, Server};

use super::{Dispatcher, Incoming, Reply};
use crate::error::ProxyError;
use crate::logging::Logger;

const RECV_POLL: Duration = Duration::from_millis(100);

pub struct HttpServer {
    server: Server,
    dispatcher: Arc<Dispatcher>,
    log: Logger,
}

impl HttpServer {
    pub fn bind(addr: &str, dispatcher: Arc<Dispatcher>, log: Logger) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| anyhow!("bind http at {}: {}", addr, e))?;
        Ok(Self {
            server,
            dispatcher,
            log,
        })
    }

    /// Фактический адрес (полезно при bind на порт 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Принимать запросы, пока `stop` не выставлен.
    pub fn serve_until(&self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            let rq = match self.server.recv_timeout(RECV_POLL) {
                Ok(Some(rq)) => rq,
                Ok(None) => continue,
                Err(e) => {
                    self.log.warn(format_args!("http recv error: {}", e));
                    continue;
                }
            };
            let d = self.dispatcher.clone();
            let log = self.log.clone();
            let spawned = thread::Builder::new()
                .name("dp-request".into())
                .spawn(move || respond(&d, rq, &log));
            if let Err(e) = spawned {
                self.log.error(format_args!("cannot spawn request thread: {}", e));
            }
        }
    }
}

fn respond(d: &Dispatcher, mut rq: Request, log: &Logger) {
    let mut body = Vec::new();
    let reply = match rq.as_reader().read_to_end(&mut body) {
        Ok(_) => {
            let url = rq.url();
            let path = url.split('?').next().unwrap_or(url).to_string();
            let content_types = rq
                .headers()
                .iter()
                .filter(|h| h.field.equiv("Content-Type"))
                .map(|h| h.value.as_str().to_string())
                .collect();
            let incoming = Incoming {
                method: rq.method().as_str().to_string(),
                path,
                content_types,
                body,
            };
            d.handle(&incoming)
        }
        Err(e) => Reply::error(&ProxyError::InvalidInput(format!("read body: {}", e))),
    };

    let Reply {
        status,
        content_type,
        headers,
        body,
    } = reply;
    let mut resp = Response::from_data(body).with_status_code(status);
    if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        resp.add_header(h);
    }
    for (k, v) in headers {
        if let Ok(h) = Header::from_bytes(k.as_bytes(), v.as_bytes()) {
            resp.add_header(h);
        }
    }
    if let Err(e) = rq.respond(resp) {
        log.warn(format_args!("http respond error: {}", e));
    }
}
