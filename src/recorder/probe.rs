// src/recorder/probe.rs
//
// Reachability check run before launching the capture process, so an
// offline camera does not leave a recorder spinning on a dead socket.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use url::Url;

use crate::core::{CaptureError, CaptureResult};

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "rtsp" => Some(554),
        "rtsps" => Some(322),
        "rtmp" => Some(1935),
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// `host:port` of a camera url; credentials and path are dropped.
pub fn camera_address(url: &str) -> CaptureResult<String> {
    let invalid = || CaptureError::InvalidUrl { url: redact(url) };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(invalid)?;
    let port = parsed
        .port_or_known_default()
        .or_else(|| default_port(parsed.scheme()))
        .ok_or_else(invalid)?;

    Ok(format!("{}:{}", host, port))
}

pub fn resolve(address: &str) -> CaptureResult<SocketAddr> {
    address
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| CaptureError::Unresolvable {
            address: address.to_string(),
        })
}

pub fn is_reachable(addr: &SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(addr, timeout).is_ok()
}

/// Url with the password part of the credentials masked, for log lines.
pub fn redact(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.password().is_none() || parsed.set_password(Some("***")).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}
