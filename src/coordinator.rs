//! Coordination layer: two threads between the interpreter and the terminal.
//!
//! ```text
//!  interpreter --Event (bounded)------> render thread (Framebuffer + Surface)
//!              <--collision (rendezvous)-
//!              <--key (capacity 1)------ input thread (EventSource)
//!                                        input thread --Resize/Redraw/Quit--> render
//! ```
//!
//! Nothing is shared between the threads except the channels and a
//! `CancelToken`. Every loop checks the token once per iteration, so a quit
//! from any side stops everything within one pass.
use crate::display::{Framebuffer, Surface};
use crate::error::Fault;
use crate::input::{EventSource, InputEvent, Keymap};
use crate::interpreter::{Port, Sprite};
use log::{debug, error, info};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// room for a burst of clears and resizes before senders block
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// redraws are coalesced to roughly 60Hz
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// how long the input thread waits on the terminal before checking for quit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// what the render thread acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Clear,
    Sprite(Sprite),
    Resize,
    Redraw,
    Quit,
}

/// the one way to stop a run; cheap to clone, all clones see the same flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// the interpreter's end of the coordination layer
pub struct Link {
    events: SyncSender<Event>,
    collisions: Receiver<bool>,
    keys: Receiver<u8>,
    cancel: CancelToken,
}

impl Port for Link {
    fn poll_key(&mut self) -> Option<u8> {
        self.keys.try_recv().ok()
    }

    fn clear(&mut self) -> Result<(), Fault> {
        if self.cancel.is_cancelled() {
            return Err(Fault::Disconnected);
        }
        self.events
            .send(Event::Clear)
            .map_err(|_| Fault::Disconnected)
    }

    fn draw_sprite(&mut self, sprite: Sprite) -> Result<bool, Fault> {
        if self.cancel.is_cancelled() {
            return Err(Fault::Disconnected);
        }
        self.events
            .send(Event::Sprite(sprite))
            .map_err(|_| Fault::Disconnected)?;
        self.collisions.recv().map_err(|_| Fault::Disconnected)
    }

    fn quit(&mut self) {
        self.cancel.cancel();
        let _ = self.events.try_send(Event::Quit);
    }
}

/// owns the render and input threads; dropping it without `shutdown` still
/// stops and joins them, so the surface is released on unwind too
pub struct Coordinator {
    events: SyncSender<Event>,
    cancel: CancelToken,
    render: Option<JoinHandle<io::Result<()>>>,
    input: Option<JoinHandle<io::Result<()>>>,
}

impl Coordinator {
    /// start both threads; the surface moves onto the render thread and is
    /// dropped (restoring the terminal) when that thread ends
    pub fn spawn<S, E>(surface: S, source: E, keymap: Keymap) -> io::Result<(Coordinator, Link)>
    where
        S: Surface + Send + 'static,
        E: EventSource + Send + 'static,
    {
        let cancel = CancelToken::new();
        let (event_tx, event_rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let (collision_tx, collision_rx) = mpsc::sync_channel(0);
        let (key_tx, key_rx) = mpsc::sync_channel(1);

        let render = {
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("mu8-render".into())
                .spawn(move || {
                    let result = render_loop(surface, event_rx, collision_tx, &cancel);
                    stop_on_error("render", result, &cancel)
                })?
        };
        let input = {
            let cancel = cancel.clone();
            let events = event_tx.clone();
            thread::Builder::new()
                .name("mu8-input".into())
                .spawn(move || {
                    let result = input_loop(source, keymap, events, key_tx, &cancel);
                    stop_on_error("input", result, &cancel)
                })?
        };

        let link = Link {
            events: event_tx.clone(),
            collisions: collision_rx,
            keys: key_rx,
            cancel: cancel.clone(),
        };
        Ok((
            Coordinator {
                events: event_tx,
                cancel,
                render: Some(render),
                input: Some(input),
            },
            link,
        ))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// cancel, tell the render thread to quit, then wait for both threads
    pub fn shutdown(mut self) -> io::Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> io::Result<()> {
        self.cancel.cancel();
        let _ = self.events.try_send(Event::Quit);
        let render = join("render", self.render.take());
        let input = join("input", self.input.take());
        info!("coordination layer stopped");
        render.and(input)
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.render.is_none() && self.input.is_none() {
            return;
        }
        if let Err(e) = self.stop() {
            error!("stopping coordination layer on drop: {}", e);
        }
    }
}

fn join(name: &str, handle: Option<JoinHandle<io::Result<()>>>) -> io::Result<()> {
    match handle {
        Some(handle) => handle.join().map_err(|_| {
            io::Error::new(io::ErrorKind::Other, format!("{} thread panicked", name))
        })?,
        None => Ok(()),
    }
}

/// an I/O failure in either thread ends the whole run
fn stop_on_error(name: &str, result: io::Result<()>, cancel: &CancelToken) -> io::Result<()> {
    if let Err(e) = &result {
        error!("{} thread failed: {}", name, e);
        cancel.cancel();
    }
    result
}

fn render_loop<S: Surface>(
    mut surface: S,
    events: Receiver<Event>,
    collisions: SyncSender<bool>,
    cancel: &CancelToken,
) -> io::Result<()> {
    let mut fb = Framebuffer::default();
    fb.render_to(&mut surface)?;
    let mut dirty = false;
    let mut last_frame = Instant::now();

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let mut force = false;
        match events.recv_timeout(FRAME_INTERVAL) {
            Ok(Event::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            // quit may have landed while we were waiting
            Ok(_) if cancel.is_cancelled() => break,
            Ok(Event::Clear) => {
                fb.clear();
                dirty = true;
            }
            Ok(Event::Sprite(sprite)) => {
                let collision =
                    fb.draw_sprite_at(&sprite.rows, sprite.x as usize, sprite.y as usize);
                if collisions.send(collision).is_err() {
                    break;
                }
                dirty = true;
            }
            Ok(Event::Resize) => {
                debug!("surface resized to {:?}", surface.size()?);
                force = true;
            }
            Ok(Event::Redraw) => force = true,
            Err(RecvTimeoutError::Timeout) => (),
        }
        if force || (dirty && last_frame.elapsed() >= FRAME_INTERVAL) {
            fb.render_to(&mut surface)?;
            dirty = false;
            last_frame = Instant::now();
        }
    }
    debug!("render thread exiting");
    Ok(())
}

fn input_loop<E: EventSource>(
    mut source: E,
    keymap: Keymap,
    events: SyncSender<Event>,
    keys: SyncSender<u8>,
    cancel: &CancelToken,
) -> io::Result<()> {
    while !cancel.is_cancelled() {
        let raw = match source.poll_event(POLL_INTERVAL)? {
            Some(raw) => raw,
            None => continue,
        };
        match keymap.translate(&raw) {
            Some(InputEvent::Key(key)) => match keys.try_send(key) {
                Ok(()) => (),
                Err(TrySendError::Full(key)) => debug!("dropped key 0x{:x}", key),
                Err(TrySendError::Disconnected(_)) => break,
            },
            Some(InputEvent::Resize) => {
                let _ = events.try_send(Event::Resize);
            }
            Some(InputEvent::Redraw) => {
                let _ = events.try_send(Event::Redraw);
            }
            Some(InputEvent::Quit) => {
                info!("interrupted from the keyboard");
                cancel.cancel();
                let _ = events.try_send(Event::Quit);
                break;
            }
            None => (),
        }
    }
    debug!("input thread exiting");
    Ok(())
}
