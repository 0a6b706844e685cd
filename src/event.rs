//! Events handed to the host input pipeline.

/// Number of axes the touchscreen reports (X and Y)
pub const AXIS_COUNT: usize = 2;

/// Absolute pointer motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEvent {
    pub is_absolute: bool,
    pub first_axis: usize,
    pub axis_count: usize,
    pub x: i32,
    pub y: i32,
}

impl MotionEvent {
    pub fn absolute(x: i32, y: i32) -> Self {
        Self {
            is_absolute: true,
            first_axis: 0,
            axis_count: AXIS_COUNT,
            x,
            y,
        }
    }
}

/// Button press or release at an absolute position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub is_absolute: bool,
    pub button: u32,
    pub is_down: bool,
    pub first_axis: usize,
    pub axis_count: usize,
    pub x: i32,
    pub y: i32,
}

impl ButtonEvent {
    pub fn absolute(button: u32, is_down: bool, x: i32, y: i32) -> Self {
        Self {
            is_absolute: true,
            button,
            is_down,
            first_axis: 0,
            axis_count: AXIS_COUNT,
            x,
            y,
        }
    }
}

/// Consumer of decoded touch events
pub trait EventSink {
    fn post_motion(&mut self, event: MotionEvent) -> anyhow::Result<()>;

    fn post_button(&mut self, event: ButtonEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedEvent {
    Motion(MotionEvent),
    Button(ButtonEvent),
}

/// Sink that keeps every event it receives, in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RecordedEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn motions(&self) -> impl Iterator<Item = &MotionEvent> {
        self.events.iter().filter_map(|event| match event {
            RecordedEvent::Motion(motion) => Some(motion),
            RecordedEvent::Button(_) => None,
        })
    }

    pub fn buttons(&self) -> impl Iterator<Item = &ButtonEvent> {
        self.events.iter().filter_map(|event| match event {
            RecordedEvent::Button(button) => Some(button),
            RecordedEvent::Motion(_) => None,
        })
    }
}

impl EventSink for RecordingSink {
    fn post_motion(&mut self, event: MotionEvent) -> anyhow::Result<()> {
        self.events.push(RecordedEvent::Motion(event));
        Ok(())
    }

    fn post_button(&mut self, event: ButtonEvent) -> anyhow::Result<()> {
        self.events.push(RecordedEvent::Button(event));
        Ok(())
    }
}
