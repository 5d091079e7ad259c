//! Action sink (§6, §9): the four OS-injection primitives, modeled as a
//! trait so the engine never depends on a concrete backend. A real
//! backend (platform input injection) lives outside this crate; here we
//! only ship the interface plus a recording test double.

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ButtonId {
    MouseLeft,
    MouseRight,
    MouseMiddle,
    Key(String),
}

/// §7 sink-failure: the engine logs a failure and keeps running. Pressed
/// state tracks *intent*, not confirmed OS state (best-effort release on
/// shutdown) — so a sink failure never changes binding state, only what
/// gets logged.
pub trait ActionSink {
    fn move_relative(&mut self, dx: i32, dy: i32) -> anyhow::Result<()>;
    fn set_position(&mut self, x: i32, y: i32) -> anyhow::Result<()>;
    fn scroll(&mut self, dx: i32, dy: i32) -> anyhow::Result<()>;
    fn button(&mut self, id: ButtonId, down: bool) -> anyhow::Result<()>;
}

/// Calls `sink` and logs (rather than propagates) a failure, per §7.
pub(crate) fn emit<F>(label: &str, f: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    if let Err(err) = f() {
        log::error!("action sink rejected {label}: {err:?}");
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Emission {
    MoveRelative { dx: i32, dy: i32 },
    SetPosition { x: i32, y: i32 },
    Scroll { dx: i32, dy: i32 },
    Button { id: ButtonId, down: bool },
}

/// Test double (§9: "a test double that records the emission log").
#[derive(Default)]
pub struct RecordingSink {
    pub log: Vec<Emission>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pressed_buttons(&self) -> Vec<ButtonId> {
        let mut pressed = Vec::new();
        for emission in &self.log {
            if let Emission::Button { id, down } = emission {
                if *down {
                    if !pressed.contains(id) {
                        pressed.push(id.clone());
                    }
                } else {
                    pressed.retain(|p| p != id);
                }
            }
        }
        pressed
    }
}

impl ActionSink for RecordingSink {
    fn move_relative(&mut self, dx: i32, dy: i32) -> anyhow::Result<()> {
        self.log.push(Emission::MoveRelative { dx, dy });
        Ok(())
    }

    fn set_position(&mut self, x: i32, y: i32) -> anyhow::Result<()> {
        self.log.push(Emission::SetPosition { x, y });
        Ok(())
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> anyhow::Result<()> {
        self.log.push(Emission::Scroll { dx, dy });
        Ok(())
    }

    fn button(&mut self, id: ButtonId, down: bool) -> anyhow::Result<()> {
        self.log.push(Emission::Button { id, down });
        Ok(())
    }
}
