//! Search-window clipping for the time-to-next-spike axis.
//!
//! A destination spike cannot occur before the previous destination spike,
//! nor (in the joint space) before the previous source spike. When trimming
//! is enabled the time window around an event is clipped at both edges and
//! the joint-space probability is rescaled by the fraction of the
//! (time × source offset) search rectangle that is actually reachable.

use crate::error::{Result, TeError};

/// Per-group radii taken from the `Knns`-th neighbour in the joint space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdaptiveRadii {
    pub source: f64,
    pub dest: f64,
    pub time: f64,
}

/// Which branch of the overlap analysis produced a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowCase {
    /// Trimming disabled.
    Untrimmed,
    /// Time and source windows do not overlap.
    Disjoint,
    /// Zero-area search rectangle.
    Degenerate,
    /// Time window wider than the source window, source window cut below.
    WideClippedBelow,
    /// Time window wider than the source window, lower edges aligned.
    WideInside,
    /// Time window no wider than the source window, source window cut below.
    NarrowClippedBelow,
    /// Time window no wider than the source window, lower edges aligned.
    NarrowInside,
}

impl WindowCase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Untrimmed => "untrimmed",
            Self::Disjoint => "disjoint",
            Self::Degenerate => "degenerate",
            Self::WideClippedBelow => "wide_clipped_below",
            Self::WideInside => "wide_inside",
            Self::NarrowClippedBelow => "narrow_clipped_below",
            Self::NarrowInside => "narrow_inside",
        }
    }
}

/// Time window used when counting destination-history matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    /// Reachable fraction of the joint search rectangle; 1 when uncorrected.
    pub search_area_ratio: f64,
    /// Distance below `time_to_next` that the window reaches.
    pub r_time_lower: f64,
    /// Distance above `time_to_next` that the window reaches.
    pub r_time_upper: f64,
    pub case: WindowCase,
}

impl SearchWindow {
    #[must_use]
    pub fn untrimmed(r_time: f64) -> Self {
        Self {
            search_area_ratio: 1.0,
            r_time_lower: r_time,
            r_time_upper: r_time,
            case: WindowCase::Untrimmed,
        }
    }

    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.r_time_lower == self.r_time_upper
    }

    /// Whether the joint-space probability needs rescaling.
    #[must_use]
    pub fn is_corrected(&self) -> bool {
        self.search_area_ratio != 1.0
    }

    /// Total width of the time window.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.r_time_lower + self.r_time_upper
    }
}

/// Compute the search window for destination event `event`.
///
/// `source_offset` is the event's first source-history entry: previous
/// destination spike minus latest source spike, negative when the source
/// fired after the destination.
pub fn search_window(
    event: usize,
    time_to_next: f64,
    source_offset: f64,
    radii: &AdaptiveRadii,
    trim: bool,
) -> Result<SearchWindow> {
    if !trim {
        return Ok(SearchWindow::untrimmed(radii.time));
    }
    let r_time = radii.time;
    let time_upper = time_to_next + r_time;
    let time_lower_clipped = (time_to_next - r_time).max(0.0);
    let source_lower = -source_offset - radii.source;
    let source_upper_raw = -source_offset + radii.source;

    let t_l = time_lower_clipped.max(source_lower);
    let t_u = time_upper;
    let s_l = source_lower;
    let s_u = time_upper.min(source_upper_raw);
    let width = t_u - t_l;
    let source_width = s_u - s_l;
    let denominator = (t_u - time_lower_clipped) * (source_upper_raw - source_lower);

    // Checked on the raw windows: after clipping, t_l >= s_l and s_u <= t_u,
    // so an inverted pair would otherwise look disjoint.
    if time_upper < source_lower {
        return Err(TeError::SearchWindowInverted {
            event,
            window_upper: time_upper,
            source_lower,
        });
    }
    if s_u < t_l {
        return Ok(SearchWindow {
            case: WindowCase::Disjoint,
            ..SearchWindow::untrimmed(r_time)
        });
    }

    let (case, area) = if width > source_width {
        if t_l < s_l {
            (
                WindowCase::WideClippedBelow,
                source_width * (t_u - s_u) + 0.5 * source_width * source_width,
            )
        } else {
            (
                WindowCase::WideInside,
                width * source_width - 0.5 * (s_u - t_l) * (s_u - t_l),
            )
        }
    } else if t_l < s_l {
        (WindowCase::NarrowClippedBelow, 0.5 * (t_u - s_l) * (t_u - s_l))
    } else {
        (
            WindowCase::NarrowInside,
            (t_l - s_l) * width + 0.5 * width * width,
        )
    };

    if denominator <= 0.0 {
        return Ok(SearchWindow {
            case: WindowCase::Degenerate,
            ..SearchWindow::untrimmed(r_time)
        });
    }
    Ok(SearchWindow {
        search_area_ratio: area / denominator,
        r_time_lower: time_to_next - t_l,
        r_time_upper: r_time,
        case,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radii(source: f64, time: f64) -> AdaptiveRadii {
        AdaptiveRadii {
            source,
            dest: 0.0,
            time,
        }
    }

    #[test]
    fn disabled_trimming_is_identity() {
        let w = search_window(0, 0.1, -3.0, &radii(0.2, 0.7), false).unwrap();
        assert_eq!(w.search_area_ratio, 1.0);
        assert_eq!(w.r_time_lower, 0.7);
        assert_eq!(w.r_time_upper, 0.7);
        assert_eq!(w.case, WindowCase::Untrimmed);
        assert!(w.is_symmetric());
        assert!(!w.is_corrected());
    }

    #[test]
    fn distant_source_window_needs_no_correction() {
        let w = search_window(0, 1.0, 5.0, &radii(0.1, 0.5), true).unwrap();
        assert_eq!(w.case, WindowCase::Disjoint);
        assert_eq!(w.search_area_ratio, 1.0);
        assert_eq!(w.r_time_lower, 0.5);
    }

    #[test]
    fn next_spike_before_latest_source_spike_is_fatal() {
        // next spike 0.1 after the previous destination spike, latest source
        // spike 5.0 after it
        let err = search_window(3, 0.1, -5.0, &radii(0.1, 0.1), true).unwrap_err();
        match err {
            TeError::SearchWindowInverted {
                event,
                window_upper,
                source_lower,
            } => {
                assert_eq!(event, 3);
                assert!((window_upper - 0.2).abs() < 1e-12);
                assert!((source_lower - 4.9).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
        // without trimming no window analysis happens
        assert!(search_window(3, 0.1, -5.0, &radii(0.1, 0.1), false).is_ok());
    }

    #[test]
    fn wide_window_clipped_at_zero_and_source() {
        // time window [0, 2] after clipping, source window [0.25, 0.75]
        let w = search_window(0, 1.0, -0.5, &radii(0.25, 1.0), true).unwrap();
        assert_eq!(w.case, WindowCase::WideInside);
        assert_eq!(w.search_area_ratio, 0.75);
        assert_eq!(w.r_time_lower, 0.75);
        assert_eq!(w.r_time_upper, 1.0);
        assert!(!w.is_symmetric());
        assert!(w.is_corrected());
    }

    #[test]
    fn narrow_window_inside_source_window() {
        // time window [0.75, 1.25], source window [0, 2]
        let w = search_window(0, 1.0, -1.0, &radii(1.0, 0.25), true).unwrap();
        assert_eq!(w.case, WindowCase::NarrowInside);
        assert_eq!(w.search_area_ratio, 0.5);
        assert_eq!(w.r_time_lower, 0.25);
        assert!(w.is_symmetric());
    }

    #[test]
    fn zero_source_radius_is_degenerate() {
        let w = search_window(0, 1.0, -1.0, &radii(0.0, 0.5), true).unwrap();
        assert_eq!(w.case, WindowCase::Degenerate);
        assert_eq!(w.search_area_ratio, 1.0);
        assert_eq!(w.r_time_lower, 0.5);
    }

    #[test]
    fn ratio_stays_within_unit_interval() {
        for &(t, s0, rs, rt) in &[
            (0.3, -0.1, 0.05, 0.2),
            (2.0, -1.5, 0.4, 0.9),
            (0.05, 0.02, 0.3, 0.1),
            (1.0, -0.9, 0.5, 2.0),
        ] {
            let w = search_window(0, t, s0, &radii(rs, rt), true).unwrap();
            assert!(
                w.search_area_ratio > 0.0 && w.search_area_ratio <= 1.0,
                "{w:?}"
            );
            assert!(w.r_time_lower <= rt + 1e-12);
        }
    }
}
