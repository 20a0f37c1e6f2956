#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub key: &'static str,
    pub metric: &'static str,
}

pub const DISPLAYED_SPEED_MPH: Tag = Tag {
    key: "displayed_speed_mph",
    metric: "speedo_displayed_speed_mph",
};

pub const DISPLAY_WRITES: Tag = Tag {
    key: "display_writes",
    metric: "speedo_display_writes_total",
};

pub const PROVIDER_FAULTS: Tag = Tag {
    key: "provider_faults",
    metric: "speedo_provider_faults_total",
};

pub const FRAMES: Tag = Tag {
    key: "frames",
    metric: "speedo_frames_total",
};
