//! # Utility module

use crate::frame::ParameterSets;
use crate::sink::{OutputSink, RawStreamSink};
use anyhow::{anyhow, Result};
use log::*;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

/// Split a `tcp://host:port` url into host and port.
///
/// Returns `Ok(None)` if the input is not a tcp url.
fn tcp_address(input: &str) -> Result<Option<(&str, u16)>> {
    match input.strip_prefix("tcp://") {
        Some(address) => {
            let (addr, port) = address
                .split_once(':')
                .ok_or_else(|| anyhow!("Invalid format, expected tcp://host:port"))?;
            let port = str::parse(port)?;
            Ok(Some((addr, port)))
        }
        None => Ok(None),
    }
}

fn tcp_stream(addr: &str, port: u16) -> Result<TcpStream> {
    let stream = if addr == "@" {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!("Listening on port {}", listener.local_addr()?.port());
        let (sock, peer) = listener.accept()?;
        info!("Accepted {peer}");
        sock
    } else {
        info!("Connecting to {addr}:{port}");
        TcpStream::connect((addr, port))?
    };

    Ok(stream)
}

/// Open a file or tcp stream for reading.
///
/// `tcp://host:port` connects to a remote host, `tcp://@:port` waits for a connection.
pub fn open_input(input: &str) -> Result<Box<dyn Read + Send>> {
    if let Some((addr, port)) = tcp_address(input)? {
        Ok(Box::new(tcp_stream(addr, port)?))
    } else {
        std::fs::File::open(input)
            .map(|i| Box::new(i) as _)
            .map_err(Into::into)
    }
}

/// Open a file or tcp stream for writing.
///
/// Accepts the same urls as [`open_input`]. Files are truncated.
pub fn open_output(output: &str) -> Result<Box<dyn Write + Send>> {
    if let Some((addr, port)) = tcp_address(output)? {
        Ok(Box::new(tcp_stream(addr, port)?))
    } else {
        std::fs::File::create(output)
            .map(|o| Box::new(std::io::BufWriter::new(o)) as _)
            .map_err(Into::into)
    }
}

/// Open the sink receiving every encoded frame.
pub fn open_continuous(output: &str) -> Result<Box<dyn OutputSink>> {
    let writer = open_output(output)?;
    info!("Streaming continuously to {output}");
    Ok(Box::new(RawStreamSink::new(
        writer,
        output.to_string(),
        &ParameterSets::default(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FrameFlags};

    #[test]
    fn parses_tcp_urls() {
        assert_eq!(
            tcp_address("tcp://localhost:9000").unwrap(),
            Some(("localhost", 9000))
        );
        assert_eq!(tcp_address("tcp://@:1234").unwrap(), Some(("@", 1234)));
        assert_eq!(tcp_address("/tmp/out.h264").unwrap(), None);
        assert!(tcp_address("tcp://localhost").is_err());
        assert!(tcp_address("tcp://localhost:port").is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.h264");
        let path = path.to_str().unwrap();

        let mut sink = open_continuous(path).unwrap();
        sink.write_frame(&Frame::new(vec![1, 2, 3], FrameFlags::keyframe(), 0))
            .unwrap();
        sink.finish().unwrap();

        let mut data = vec![];
        open_input(path).unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, [1, 2, 3]);
    }

    #[test]
    fn tcp_output() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let reader = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut data = vec![];
            sock.read_to_end(&mut data).unwrap();
            data
        });

        let mut out = open_output(&format!("tcp://127.0.0.1:{port}")).unwrap();
        out.write_all(b"frames").unwrap();
        drop(out);

        assert_eq!(reader.join().unwrap(), b"frames");
    }
}
