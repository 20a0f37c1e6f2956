//! Prometheus metrics for the speed readout.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use speedo_core::tags;
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Header, Response, Server};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

/// Speed currently shown on the readout (mph)
pub static DISPLAYED_SPEED_MPH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        tags::DISPLAYED_SPEED_MPH.metric,
        "Speed currently shown on the readout in mph",
    )
    .expect("valid gauge definition");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
});

pub static DISPLAY_WRITES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(tags::DISPLAY_WRITES.metric, "Text writes made to the readout")
});

pub static PROVIDER_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        tags::PROVIDER_FAULTS.metric,
        "Ticks on which the location provider failed to report a speed",
    )
});

pub static FRAMES: LazyLock<IntCounter> =
    LazyLock::new(|| register_counter(tags::FRAMES.metric, "Frames delivered by the scheduler"));

/// Force registration so every series is exported before the first frame.
pub fn init_metrics() {
    let _ = DISPLAYED_SPEED_MPH.get();
    let _ = DISPLAY_WRITES.get();
    let _ = PROVIDER_FAULTS.get();
    let _ = FRAMES.get();
}

pub fn encode_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Start the metrics HTTP server on the given address.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(addr = %bind_addr, error = %e, "Failed to start metrics server");
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let response = match request.url() {
                "/metrics" => match encode_metrics() {
                    Ok(buffer) => {
                        let mut response = Response::from_data(buffer);
                        if let Ok(header) = Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        ) {
                            response.add_header(header);
                        }
                        response
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode metrics");
                        Response::from_data(b"Internal Server Error".to_vec()).with_status_code(500)
                    }
                },
                "/health" => Response::from_data(b"OK".to_vec()),
                "/ready" => {
                    if FRAMES.get() > 0 {
                        Response::from_data(b"Ready".to_vec())
                    } else {
                        Response::from_data(b"Not Ready".to_vec()).with_status_code(503)
                    }
                }
                _ => Response::from_data(b"Not Found".to_vec()).with_status_code(404),
            };
            let _ = request.respond(response);
        }
    })
}
