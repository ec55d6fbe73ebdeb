mod live_conversations;
pub mod servers;

use std::io::{Cursor, Read, Write};

/// In-memory peer: reads come from a fixed script and end in EOF, writes are
/// collected in `outbound`.
#[derive(Debug, Default)]
pub struct ScriptedStream {
    pub inbound: Cursor<Vec<u8>>,
    pub outbound: Vec<u8>,
}

impl ScriptedStream {
    pub fn new(inbound: Vec<u8>) -> Self {
        Self {
            inbound: Cursor::new(inbound),
            outbound: Vec::new(),
        }
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inbound.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.outbound.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
