//! A fake SCPI instrument listening on a local TCP socket.
use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::BytesMut;
use scpi_protocol::codec::TerminatedCodec;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::Instant,
};
use tokio_util::codec::Decoder;

/// Produces the bytes to send back for one received command line, if any.
pub type Handler = dyn Fn(&str) -> Option<Vec<u8>> + Send + Sync;

pub struct FakeInstrument {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeInstrument {
    /// Starts listening on an ephemeral port. Every connection is served by `handler`.
    pub async fn spawn(
        handler: impl Fn(&str) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> io::Result<FakeInstrument> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let log = received.clone();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                log::info!("Fake instrument accepted {}", peer);
                tokio::spawn(serve(stream, handler.clone(), log.clone()));
            }
        });
        Ok(FakeInstrument { addr, received })
    }

    pub fn resource_string(&self) -> String {
        format!("TCPIP0::127.0.0.1::{}::SOCKET", self.addr.port())
    }

    /// Command lines received so far, without the termination.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Waits up to two seconds until at least `count` commands have arrived and returns them.
    pub async fn wait_for_commands(&self, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let received = self.received();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// A text reply terminated by a newline.
pub fn line(reply: &str) -> Option<Vec<u8>> {
    Some(format!("{reply}\n").into_bytes())
}

async fn serve(mut stream: TcpStream, handler: Arc<Handler>, received: Arc<Mutex<Vec<String>>>) {
    let mut codec = TerminatedCodec::default();
    let mut buffer = BytesMut::new();
    loop {
        match codec.decode(&mut buffer) {
            Ok(Some(frame)) => {
                let command = String::from_utf8_lossy(&frame).into_owned();
                log::debug!("Fake instrument received {:?}", command);
                let reply = handler(&command);
                received.lock().unwrap().push(command);
                if let Some(reply) = reply
                    && stream.write_all(&reply).await.is_err()
                {
                    return;
                }
                continue;
            }
            Ok(None) => {}
            Err(_) => return,
        }
        match stream.read_buf(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
