use std::time::Duration;

use scpi_client::{BinaryPayload, Error, OpenOptions, ResourceManager};
use scpi_protocol::{BinaryFormat, ascii::Separator, block::encode_block};
use scpi_tests::{FakeInstrument, init_logging, line};

fn waveform() -> Vec<u8> {
    (0..200_000u32).map(|i| (i % 200) as u8).collect()
}

async fn instrument() -> FakeInstrument {
    FakeInstrument::spawn(|command| match command {
        "*IDN?" => line("ACME,SCOPE-1000,SN42,1.0.3"),
        "MEAS:VOLT?" => line("+1.250E+00,+1.260E+00,+1.270E+00"),
        "*STB?" => line("+32"),
        "WAV:DATA?" => {
            let format: BinaryFormat = "h<".parse().ok()?;
            let mut reply = encode_block(&format.encode(&[-1.0, 0.0, 1.0, 512.0]));
            reply.push(b'\n');
            Some(reply)
        }
        "CURV?" => {
            let mut reply = encode_block(&waveform());
            reply.push(b'\n');
            Some(reply)
        }
        _ => None,
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn identify_and_measure() {
    init_logging();
    let instrument = instrument().await;
    let manager = ResourceManager::new();
    let scope = manager
        .open_resource(&instrument.resource_string(), OpenOptions::new())
        .await
        .unwrap();

    assert_eq!(
        scope.query("*IDN?").await.unwrap(),
        "ACME,SCOPE-1000,SN42,1.0.3"
    );
    assert_eq!(
        scope
            .query_ascii_values("MEAS:VOLT?", &Separator::Default)
            .await
            .unwrap(),
        vec![1.25, 1.26, 1.27]
    );
    assert_eq!(scope.read_stb().await.unwrap(), 32);
    scope.trigger().await.unwrap();
    scope.clear().await.unwrap();

    scope.close().await.unwrap();
    assert!(matches!(scope.query("*IDN?").await, Err(Error::NotOpen(_))));
    assert_eq!(
        instrument.wait_for_commands(5).await,
        vec!["*IDN?", "MEAS:VOLT?", "*STB?", "*TRG", "*CLS"]
    );
}

#[tokio::test]
async fn typed_binary_values() {
    let instrument = instrument().await;
    let manager = ResourceManager::new();
    let scope = manager
        .open_resource(&instrument.resource_string(), OpenOptions::new())
        .await
        .unwrap();
    let format: BinaryFormat = "h<".parse().unwrap();
    assert_eq!(
        scope.query_binary_values("WAV:DATA?", format).await.unwrap(),
        vec![-1.0, 0.0, 1.0, 512.0]
    );
    // The block's trailing newline is dropped by the next write.
    assert_eq!(
        scope.query("*IDN?").await.unwrap(),
        "ACME,SCOPE-1000,SN42,1.0.3"
    );
}

#[tokio::test]
async fn large_block_spans_chunks() {
    init_logging();
    let instrument = instrument().await;
    let manager = ResourceManager::new();
    let scope = manager
        .open_resource(&instrument.resource_string(), OpenOptions::new())
        .await
        .unwrap();
    scope.set_chunk_size(4096);
    assert_eq!(scope.query_binary("CURV?").await.unwrap(), waveform());
}

#[tokio::test]
async fn writes_reach_the_instrument() {
    let instrument = instrument().await;
    let manager = ResourceManager::new();
    let awg = manager
        .open_resource(&instrument.resource_string(), OpenOptions::new())
        .await
        .unwrap();

    awg.write_ascii_values("LIST:VOLT ", &[1.5, 2.0, 2.5], &Separator::Default)
        .await
        .unwrap();
    let format: BinaryFormat = "B".parse().unwrap();
    awg.write_binary_values(
        "DATA:ARB ",
        BinaryPayload::Values {
            values: &[65.0, 66.0, 67.0],
            format,
        },
    )
    .await
    .unwrap();
    awg.write("*OPC").await.unwrap();

    assert_eq!(
        instrument.wait_for_commands(3).await,
        vec!["LIST:VOLT 1.5,2,2.5", "DATA:ARB #13ABC", "*OPC"]
    );
}

#[tokio::test]
async fn unanswered_query_times_out() {
    let instrument = instrument().await;
    let manager = ResourceManager::new();
    let scope = manager
        .open_resource(
            &instrument.resource_string(),
            OpenOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    assert!(matches!(
        scope.query("SYST:ERR?").await,
        Err(Error::Timeout(_))
    ));
}

#[tokio::test]
async fn connection_refused() {
    let manager = ResourceManager::new();
    // Port 1 on loopback is not expected to accept connections.
    let result = manager
        .open_resource(
            "TCPIP0::127.0.0.1::1::SOCKET",
            OpenOptions::new().timeout(Duration::from_millis(500)),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(manager.open_count("TCPIP0::127.0.0.1::1::SOCKET"), 0);
}
