//! Text of the coordinate panel.

use crate::sensor::GeoFix;

/// Shown until the first fix.
pub const PLACEHOLDER: &str = "等待位置信息...";
/// Shown when the watchdog fires before any fix.
pub const NO_SIGNAL: &str = "GPS未响应，请检查权限或点击测试按钮";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum State {
    #[default]
    Waiting,
    Showing(GeoFix),
    NoSignal,
}

/// What the coordinate panel displays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoordinateReadout {
    state: State,
}

impl CoordinateReadout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a fix. Replaces the placeholder or the no-signal text.
    pub fn show(&mut self, fix: GeoFix) {
        self.state = State::Showing(fix);
    }

    /// Switch to the no-signal text if still waiting. Returns true if it switched.
    pub fn mark_no_signal(&mut self) -> bool {
        if self.state == State::Waiting {
            self.state = State::NoSignal;
            true
        } else {
            false
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.state == State::Waiting
    }

    /// True when the panel should be highlighted as an error.
    pub fn is_no_signal(&self) -> bool {
        self.state == State::NoSignal
    }

    pub fn fix(&self) -> Option<&GeoFix> {
        match &self.state {
            State::Showing(fix) => Some(fix),
            _ => None,
        }
    }

    /// Panel lines, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        match &self.state {
            State::Waiting => vec![PLACEHOLDER.to_owned()],
            State::NoSignal => vec![NO_SIGNAL.to_owned()],
            State::Showing(fix) => {
                let mut lines = vec![
                    format!("纬度: {:.6}°", fix.latitude),
                    format!("经度: {:.6}°", fix.longitude),
                ];
                if fix.accuracy_meters > 0.0 {
                    lines.push(format!("精度: ±{:.2}米", fix.accuracy_meters));
                }
                lines
            }
        }
    }
}
