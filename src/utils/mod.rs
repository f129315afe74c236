mod duration;

pub use self::duration::{TICKS_PER_SECOND, decode_tick_duration, ticks_to_duration};
