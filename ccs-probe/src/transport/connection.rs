use std::{
    io::{self, ErrorKind},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

/// Open a TCP connection to `host:port`.
///
/// `timeout` bounds the connect attempt to each resolved address and every
/// later blocking read or write on the socket.
pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for address in (host, port).to_socket_addrs()? {
        tracing::debug!(%address, "connecting");
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                // fragments are meant to leave as separate records, not to be
                // delayed and merged by Nagle
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%address, "connect failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            ErrorKind::NotFound,
            format!("{host} did not resolve to any address"),
        )
    }))
}
