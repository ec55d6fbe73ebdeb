//! Local peers for the conversations to talk to.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpListener, TcpStream},
    thread::JoinHandle,
    time::Duration,
};

use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    dh::Dh,
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
    rsa::Rsa,
    ssl::{Ssl, SslContext, SslMethod, SslStream, SslVersion},
    x509::{X509Name, X509},
};

/// Every TLS 1.2 key exchange and record protection the probe implements.
const SERVER_CIPHERS: &str = "ECDHE-RSA-AES128-SHA:DHE-RSA-AES128-SHA:AES128-SHA:\
    ECDHE-RSA-AES128-GCM-SHA256:ECDHE-RSA-AES256-GCM-SHA384:ECDHE-RSA-CHACHA20-POLY1305";

const RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\n\r\n";

/// Bound on every server side read, so a confused test can't hang forever.
const SERVER_TIMEOUT: Duration = Duration::from_secs(10);

fn self_signed_rsa() -> Result<(PKey<Private>, X509), openssl::error::ErrorStack> {
    let key = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut name = X509Name::builder()?;
    name.append_entry_by_nid(Nid::COMMONNAME, "localhost")?;
    let name = name.build();

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    builder.set_serial_number(BigNum::from_u32(1)?.to_asn1_integer()?.as_ref())?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    builder.set_not_before(Asn1Time::days_from_now(0)?.as_ref())?;
    builder.set_not_after(Asn1Time::days_from_now(1)?.as_ref())?;
    builder.sign(&key, MessageDigest::sha256())?;
    Ok((key, builder.build()))
}

fn server_context() -> anyhow::Result<SslContext> {
    let (key, certificate) = self_signed_rsa()?;
    let mut builder = SslContext::builder(SslMethod::tls_server())?;
    builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
    builder.set_cipher_list(SERVER_CIPHERS)?;
    builder.set_tmp_dh(Dh::get_2048_256()?.as_ref())?;
    builder.set_certificate(&certificate)?;
    builder.set_private_key(&key)?;
    builder.check_private_key()?;
    Ok(builder.build())
}

/// Stop sending, then read until the client hangs up. Closing a socket with
/// unread data would send a reset, which could overtake the alert.
fn drain(mut stream: TcpStream) {
    let _ = stream.shutdown(Shutdown::Write);
    let _ = io::copy(&mut stream, &mut io::sink());
}

/// An OpenSSL TLS 1.2 server with a fresh self-signed RSA certificate.
///
/// It accepts `connections` connections, one after the other. A completed
/// handshake gets an HTTP response to whatever it sends and a close_notify
/// once the client sends one. A failed handshake is closed after OpenSSL has
/// sent its alert.
pub struct OpenSslServer {
    port: u16,
    handle: JoinHandle<anyhow::Result<Vec<bool>>>,
}

impl OpenSslServer {
    pub fn spawn(connections: usize) -> anyhow::Result<Self> {
        let context = server_context()?;
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let handle = std::thread::spawn(move || {
            let mut handshakes = Vec::with_capacity(connections);
            for _ in 0..connections {
                let (stream, _) = listener.accept()?;
                stream.set_read_timeout(Some(SERVER_TIMEOUT))?;
                handshakes.push(serve(&context, stream)?);
            }
            Ok(handshakes)
        });
        Ok(Self { port, handle })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for every connection to finish. One entry per connection, true if
    /// its handshake completed.
    pub fn join(self) -> anyhow::Result<Vec<bool>> {
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))?
    }
}

fn serve(context: &SslContext, stream: TcpStream) -> anyhow::Result<bool> {
    let mut tls = SslStream::new(Ssl::new(context)?, stream)?;
    if let Err(e) = tls.accept() {
        tracing::debug!("server handshake failed: {e}");
        let stream = tls.get_ref().try_clone()?;
        drain(stream);
        return Ok(false);
    }

    let mut request = [0; 1024];
    let read = tls.read(&mut request)?;
    tracing::debug!(read, "server received request");
    tls.write_all(RESPONSE)?;

    // wait for the client's close_notify, then answer it
    let mut rest = [0; 64];
    while tls.read(&mut rest)? > 0 {}
    tls.shutdown()?;
    Ok(true)
}

/// A server that reads one flight, whatever it contains, and answers with a
/// bare ServerHelloDone. Stands in for a peer that never rejects anything.
pub struct AcceptingServer {
    port: u16,
    handle: JoinHandle<io::Result<()>>,
}

impl AcceptingServer {
    pub fn spawn() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept()?;
            stream.set_read_timeout(Some(SERVER_TIMEOUT))?;
            let mut buffer = [0; 4096];
            if stream.read(&mut buffer)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "client closed without sending a flight",
                ));
            }
            stream.write_all(&[22, 3, 3, 0, 4, 14, 0, 0, 0])?;
            drain(stream);
            Ok(())
        });
        Ok(Self { port, handle })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn join(self) -> io::Result<()> {
        self.handle
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "server thread panicked"))?
    }
}
