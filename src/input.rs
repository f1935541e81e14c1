//! Touchscreen discovery (evdev 0.13).

use evdev::{AbsoluteAxisCode, Device, EventType};

use crate::tracker::AxisRange;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub x: AxisRange,
    pub y: AxisRange,
}

fn is_multitouch(dev: &Device) -> bool {
    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
    let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    });
    has_abs && has_mt
}

/// Raw coordinate ranges of the multitouch position axes.
pub fn axis_ranges(dev: &Device) -> (AxisRange, AxisRange) {
    let mut x = AxisRange::default();
    let mut y = AxisRange::default();
    if let Ok(infos) = dev.get_absinfo() {
        for (code, info) in infos {
            if code == AbsoluteAxisCode::ABS_MT_POSITION_X {
                x = AxisRange::new(info.minimum(), info.maximum());
            } else if code == AbsoluteAxisCode::ABS_MT_POSITION_Y {
                y = AxisRange::new(info.minimum(), info.maximum());
            }
        }
    }
    (x, y)
}

pub fn discover_touch_surfaces() -> Vec<DeviceInfo> {
    let mut out = vec![];
    let Ok(rd) = std::fs::read_dir("/dev/input") else {
        return out;
    };
    for e in rd.flatten() {
        let p = e.path();
        let is_event_node = p
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("event"));
        if !is_event_node {
            continue;
        }
        if let Ok(dev) = Device::open(&p) {
            if is_multitouch(&dev) {
                let (x, y) = axis_ranges(&dev);
                out.push(DeviceInfo {
                    path: p.display().to_string(),
                    name: dev.name().unwrap_or("unknown").to_string(),
                    x,
                    y,
                });
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}
