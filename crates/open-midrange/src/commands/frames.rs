//! Frames command implementation - dump data-stream frames from a capture.
//!
//! A capture is the raw byte stream received from a host server: frames
//! back to back with no extra framing.

use std::io::Write;
use std::path::Path;

use miette::{IntoDiagnostic, Result, WrapErr};

use open_midrange_datastream::code_points::{EXCHANGE_SEED_REPLY, START_SERVER_REPLY};
use open_midrange_datastream::{
    hex_preview, DataStreamConfig, DataStreamDispatcher, ExchangeSeedReply, FrameKey,
    ReplyDataStream, ServerId, StartServerReply,
};

use crate::output::{print_json, FrameEntry, FramesOutput, OutputFormat};

const ALL_SERVERS: [u16; 7] = [
    ServerId::CENTRAL,
    ServerId::FILE,
    ServerId::PRINT,
    ServerId::DATABASE,
    ServerId::DATA_QUEUE,
    ServerId::REMOTE_COMMAND,
    ServerId::SIGNON,
];

/// Dispatcher with the connection-setup replies of every server registered.
pub fn dispatcher(config: DataStreamConfig) -> DataStreamDispatcher {
    let mut dispatcher = DataStreamDispatcher::new(config);
    for server in ALL_SERVERS {
        dispatcher.register_prototype(
            FrameKey::new(server, EXCHANGE_SEED_REPLY),
            ExchangeSeedReply::boxed,
        );
        dispatcher.register_prototype(
            FrameKey::new(server, START_SERVER_REPLY),
            StartServerReply::boxed,
        );
    }
    dispatcher
}

fn entry(index: usize, reply: &(dyn ReplyDataStream + 'static)) -> FrameEntry {
    let frame = reply.data_stream();
    let (variant, return_code) = if let Some(seed) = reply.downcast_ref::<ExchangeSeedReply>() {
        ("exchange-seed", seed.return_code().ok())
    } else if let Some(start) = reply.downcast_ref::<StartServerReply>() {
        ("start-server", start.return_code().ok())
    } else {
        ("generic", None)
    };
    FrameEntry {
        index,
        length: frame.length(),
        header_id: frame.header_id(),
        server_id: frame.server_id(),
        server: ServerId::name(frame.server_id()).map(str::to_string),
        cs_instance: frame.cs_instance(),
        correlation: frame.correlation(),
        template_len: frame.template_len(),
        req_rep_id: frame.req_rep_id(),
        variant: variant.to_string(),
        return_code,
        payload_hex: hex_preview(frame.payload(), 32),
    }
}

/// Parse every frame in a capture.
///
/// Returns the frames parsed before the first error, and that error.
pub async fn parse_capture(
    bytes: &[u8],
    config: DataStreamConfig,
) -> (Vec<FrameEntry>, Option<open_midrange_datastream::DataStreamError>) {
    let dispatcher = dispatcher(config);
    let mut source = bytes;
    let mut entries = Vec::new();
    while !source.is_empty() {
        match dispatcher.receive(&mut source).await {
            Ok(reply) => entries.push(entry(entries.len(), reply.as_ref())),
            Err(e) => return (entries, Some(e)),
        }
    }
    (entries, None)
}

/// Dump the frames in `input`.
pub async fn run<W: Write>(
    input: &Path,
    config: DataStreamConfig,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read capture file: {}", input.display()))?;

    tracing::info!(bytes = bytes.len(), "Reading frames from {}", input.display());
    let (frames, error) = parse_capture(&bytes, config).await;
    let count = frames.len();

    if format.is_json() {
        print_json(
            out,
            &FramesOutput {
                frames,
                error: error.as_ref().map(|e| e.to_string()),
            },
        )?;
    } else {
        for f in &frames {
            writeln!(
                out,
                "#{:<3} server=0x{:04X} ({}) reqrep=0x{:04X} len={} corr={} tmpl={} variant={}{}",
                f.index,
                f.server_id,
                f.server.as_deref().unwrap_or("unknown"),
                f.req_rep_id,
                f.length,
                f.correlation,
                f.template_len,
                f.variant,
                f.return_code.map(|rc| format!(" rc={}", rc)).unwrap_or_default(),
            )
            .into_diagnostic()?;
            if !f.payload_hex.is_empty() {
                writeln!(out, "     {}", f.payload_hex).into_diagnostic()?;
            }
        }
    }

    match error {
        Some(e) => Err(e).wrap_err(format!("Capture stopped after {} frame(s)", count)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_midrange_datastream::DataStream;

    fn seed_reply(server: u16) -> Vec<u8> {
        let mut payload = 0u32.to_be_bytes().to_vec();
        payload.extend_from_slice(&[7; 8]);
        DataStream::request(server, EXCHANGE_SEED_REPLY, 4, &payload)
            .as_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn test_parse_capture_variants() {
        let mut capture = seed_reply(ServerId::SIGNON);
        capture.extend_from_slice(
            DataStream::request(ServerId::DATABASE, START_SERVER_REPLY, 4, &[0, 0, 0, 1]).as_bytes(),
        );
        capture.extend_from_slice(DataStream::request(0xE0FF, 0x1234, 0, b"xy").as_bytes());

        let (frames, error) = parse_capture(&capture, DataStreamConfig::default()).await;
        assert!(error.is_none());
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].variant, "exchange-seed");
        assert_eq!(frames[0].server.as_deref(), Some("signon"));
        assert_eq!(frames[0].return_code, Some(0));
        assert_eq!(frames[1].variant, "start-server");
        assert_eq!(frames[1].return_code, Some(1));
        assert_eq!(frames[2].variant, "generic");
        assert_eq!(frames[2].server, None);
        assert_eq!(frames[2].payload_hex, "78 79");
    }

    #[tokio::test]
    async fn test_parse_capture_truncated() {
        let mut capture = seed_reply(ServerId::CENTRAL);
        capture.extend_from_slice(&seed_reply(ServerId::CENTRAL)[..25]);
        let (frames, error) = parse_capture(&capture, DataStreamConfig::default()).await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            error,
            Some(open_midrange_datastream::DataStreamError::ConnectionDropped { expected: 12, received: 5 })
        ));
    }

    #[tokio::test]
    async fn test_run_json_output_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        let mut capture = seed_reply(ServerId::SIGNON);
        capture.extend_from_slice(&[0u8; 10]);
        std::fs::write(&path, capture).unwrap();

        let mut out = Vec::new();
        let result = run(&path, DataStreamConfig::default(), OutputFormat::Json, &mut out).await;
        assert!(result.is_err());
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["frames"].as_array().unwrap().len(), 1);
        assert_eq!(value["frames"][0]["variant"], "exchange-seed");
        assert!(value["error"].as_str().unwrap().contains("Connection dropped"));
    }

    #[tokio::test]
    async fn test_run_text_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        std::fs::write(&path, seed_reply(ServerId::SIGNON)).unwrap();

        let mut out = Vec::new();
        run(&path, DataStreamConfig::default(), OutputFormat::Text, &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("server=0xE009 (signon)"));
        assert!(text.contains("variant=exchange-seed rc=0"));
    }
}
