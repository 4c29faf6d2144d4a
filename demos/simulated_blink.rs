//! Blink transmitter against a simulated radio
//!
//! Every line typed on stdin becomes the payload of the next blink. The
//! simulated radio prints each frame it is asked to send.
//!
//! ``` text
//! RUST_LOG=info cargo run --example simulated_blink
//! ```

use std::{
    collections::VecDeque,
    convert::Infallible,
    io::BufRead,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::Duration,
};

use dw3000_blink::{
    Config, ConsoleInput, CycleConfig, RadioDevice, Retransmit, Step, SysStatus, TransmitCycle,
    TxConfig, TxMode,
};

/// Lines from stdin, handed out without ever waiting
struct StdinConsole {
    lines: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl StdinConsole {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line.into_bytes()).is_err() {
                    break;
                }
            }
        });

        StdinConsole {
            lines: rx,
            pending: VecDeque::new(),
        }
    }
}

impl ConsoleInput for StdinConsole {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        if self.pending.is_empty() {
            match self.lines.try_recv() {
                Ok(line) => self.pending.extend(line),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return 0,
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }

        n
    }
}

/// A radio that is always idle and sends instantly
#[derive(Default)]
struct SimulatedRadio {
    tx_buffer: Vec<u8>,
    frame_len: usize,
    status: u64,
}

impl RadioDevice for SimulatedRadio {
    type Error = Infallible;

    async fn check_idle(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    async fn configure(&mut self, config: &Config) -> Result<(), Infallible> {
        log::info!("configured: {:?}", config);
        Ok(())
    }

    async fn set_tx_rf_params(&mut self, config: &TxConfig) -> Result<(), Infallible> {
        log::info!("tx rf: {:?}", config);
        Ok(())
    }

    async fn write_tx_data(&mut self, data: &[u8], offset: u16) -> Result<(), Infallible> {
        let offset = offset as usize;
        if self.tx_buffer.len() < offset + data.len() {
            self.tx_buffer.resize(offset + data.len(), 0);
        }
        self.tx_buffer[offset..offset + data.len()].copy_from_slice(data);

        Ok(())
    }

    async fn write_tx_frame_control(
        &mut self,
        len: u16,
        _offset: u16,
        _ranging: bool,
    ) -> Result<(), Infallible> {
        self.frame_len = len as usize;
        Ok(())
    }

    async fn start_tx(&mut self, mode: TxMode) -> Result<(), Infallible> {
        let body = self.frame_len.saturating_sub(dw3000_blink::FCS_LEN);
        println!("on air ({:?}): {:02x?}", mode, &self.tx_buffer[..body]);

        self.status |= SysStatus::TXFRS.bits();
        Ok(())
    }

    async fn abort_tx(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn read_status(&mut self) -> Result<SysStatus, Infallible> {
        Ok(SysStatus(self.status))
    }

    async fn clear_status(&mut self, status: SysStatus) -> Result<(), Infallible> {
        self.status &= !status.bits();
        Ok(())
    }
}

struct TokioDelay;

impl embedded_hal_async::delay::DelayNs for TokioDelay {
    async fn delay_ns(&mut self, ns: u32) {
        tokio::time::sleep(Duration::from_nanos(ns as u64)).await;
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = CycleConfig {
        inter_frame_delay_ms: 1000,
        retransmit: Retransmit::Repeat,
        ..Default::default()
    };

    let mut cycle: TransmitCycle<_, _, _, 12> = TransmitCycle::start(
        SimulatedRadio::default(),
        StdinConsole::spawn(),
        TokioDelay,
        &Config::default(),
        &TxConfig::default(),
        config,
    )
    .await
    .expect("Failed to start the radio");

    println!("Type a line to blink it");

    loop {
        match cycle.step().await {
            Ok(Step::Idle) => tokio::time::sleep(Duration::from_millis(10)).await,
            Ok(Step::Sent { .. }) => {}
            Err(e) => log::error!("{}", e),
        }
    }
}
