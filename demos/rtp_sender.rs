//! One-to-many WebRTC sender fed with RTP over UDP
//!
//! Run with: cargo run --example rtp_sender --features webrtc-engine -- [OPTIONS]
//!
//! Examples:
//!   cargo run --example rtp_sender --features webrtc-engine
//!   cargo run --example rtp_sender --features webrtc-engine -- --relay ws://10.0.0.5:8080/ws
//!   cargo run --example rtp_sender --features webrtc-engine -- --reap-after 30
//!
//! ## Feeding video
//!
//! With GStreamer:
//!   gst-launch-1.0 videotestsrc is-live=true ! x264enc tune=zerolatency key-int-max=30 \
//!     ! rtph264pay config-interval=1 pt=96 ! udpsink host=127.0.0.1 port=5004
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.mp4 -an -c:v libx264 -bsf:v h264_mp4toannexb \
//!     -f rtp rtp://127.0.0.1:5004
//!
//! Every viewer that joins through the relay gets its own peer connection and
//! receives the same packets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use tokio::net::UdpSocket;

use webrtc_fanout::registry::RegistryConfig;
use webrtc_fanout::transport::webrtc::WebRtcEngine;
use webrtc_fanout::transport::{ConnectionConfig, IceServer, TrackSpec};
use webrtc_fanout::{SampleSink, SenderConfig, SenderContext, SignalingConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fan one RTP video feed out to WebRTC viewers", long_about = None)]
struct Args {
    /// Signaling relay WebSocket URL
    #[arg(short, long, env = "SIGNALING_URL", default_value = "ws://localhost:8080/ws")]
    relay: String,

    /// UDP address to receive RTP packets on
    #[arg(short, long, default_value = "127.0.0.1:5004")]
    input: SocketAddr,

    /// STUN server URL (repeatable)
    #[arg(long, default_value = "stun:stun.l.google.com:19302")]
    stun: Vec<String>,

    /// Remove sessions that stay disconnected or failed this many seconds
    #[arg(long)]
    reap_after: Option<u64>,

    /// RTP payload type of the incoming H.264 stream
    #[arg(long, default_value_t = 96)]
    payload_type: u8,

    /// Packets queued between the socket and the fan-out
    #[arg(long, default_value_t = 64)]
    sink_capacity: usize,

    /// Do not re-offer when an answer arrives for an unknown viewer
    #[arg(long)]
    no_answer_fallback: bool,
}

/// Forward every datagram to the fan-out until the socket fails
async fn pump_rtp(socket: UdpSocket, sink: SampleSink) -> std::io::Result<()> {
    let mut buf = vec![0u8; 1500];
    loop {
        let (n, _) = socket.recv_from(&mut buf).await?;
        if !sink.push(Bytes::copy_from_slice(&buf[..n])) {
            tracing::trace!(bytes = n, "RTP packet dropped");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("webrtc_fanout=info".parse()?)
                .add_directive("rtp_sender=info".parse()?),
        )
        .init();

    let mut registry = RegistryConfig::default()
        .connection(
            ConnectionConfig::default()
                .ice_servers(args.stun.iter().map(IceServer::stun).collect()),
        )
        .track(TrackSpec::default().payload_type(args.payload_type));
    if let Some(secs) = args.reap_after {
        registry = registry.reap_after(Duration::from_secs(secs));
    }

    let config = SenderConfig::default()
        .registry(registry)
        .signaling(SignalingConfig::default().answer_fallback(!args.no_answer_fallback))
        .sink_capacity(args.sink_capacity);

    let engine = Arc::new(WebRtcEngine::new(&config.registry.track)?);
    let (context, outbound) = SenderContext::new(engine, config);

    let socket = UdpSocket::bind(args.input).await?;
    println!("Receiving RTP on udp://{}", args.input);
    println!("Signaling relay: {}", args.relay);
    println!();

    let rtp = tokio::spawn(pump_rtp(socket, context.sink()));

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    ticker.tick().await;

    {
        let relay = context.run_relay(&args.relay, outbound);
        tokio::pin!(relay);

        loop {
            tokio::select! {
                result = &mut relay => {
                    if let Err(e) = result {
                        eprintln!("Relay error: {}", e);
                    }
                    break;
                }
                _ = ticker.tick() => {
                    let stats = context.stats();
                    println!(
                        "Stats: viewers={} packets={} delivered={} failed={} dropped={} bitrate={}kbps",
                        context.registry().count().await,
                        stats.samples,
                        stats.deliveries,
                        stats.failures,
                        stats.dropped,
                        stats.bitrate() / 1000,
                    );
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\nShutting down...");
                    break;
                }
            }
        }
    }

    rtp.abort();
    let closed = context.shutdown().await;
    println!("Closed {} session(s)", closed);

    Ok(())
}
