use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WindowState {
    Unvalidated,
    Valid,
    InvalidOrder,
    WindowTooLarge,
}

impl WindowState {
    /// 界面按钮上的提示文字
    pub fn label(self) -> &'static str {
        match self {
            WindowState::Unvalidated => "Validate Dates",
            WindowState::Valid => "Times Valid",
            WindowState::InvalidOrder => "Invalid Times",
            WindowState::WindowTooLarge => "Time Window Too Large",
        }
    }
}

/// 时间窗口状态机：只有显式调用 `validate` 才会迁移状态，不会自动重置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeWindow {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    max_span_days: i64,
    state: WindowState,
}

impl TimeWindow {
    pub fn new(max_span_days: i64) -> Self {
        Self {
            start: None,
            end: None,
            max_span_days,
            state: WindowState::Unvalidated,
        }
    }

    pub fn validate(&mut self, start: NaiveDateTime, end: NaiveDateTime) -> WindowState {
        self.start = Some(start);
        self.end = Some(end);
        self.state = if start >= end {
            WindowState::InvalidOrder
        } else if (end - start).num_days() > self.max_span_days {
            WindowState::WindowTooLarge
        } else {
            WindowState::Valid
        };
        self.state
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state == WindowState::Valid
    }

    pub fn max_span_days(&self) -> i64 {
        self.max_span_days
    }

    /// 只有状态为 Valid 时才返回起止时间
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match (self.state, self.start, self.end) {
            (WindowState::Valid, Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn starts_unvalidated() {
        let window = TimeWindow::new(31);
        assert_eq!(window.state(), WindowState::Unvalidated);
        assert!(window.bounds().is_none());
    }

    #[test]
    fn validate_transitions() {
        let mut window = TimeWindow::new(31);
        assert_eq!(window.validate(day(2024, 1, 10), day(2024, 1, 1)), WindowState::InvalidOrder);
        assert_eq!(window.validate(day(2024, 1, 1), day(2024, 3, 1)), WindowState::WindowTooLarge);
        assert_eq!(window.validate(day(2024, 1, 1), day(2024, 1, 10)), WindowState::Valid);
        assert_eq!(window.bounds(), Some((day(2024, 1, 1), day(2024, 1, 10))));
    }

    #[test]
    fn equal_bounds_are_invalid_order() {
        let mut window = TimeWindow::new(31);
        assert_eq!(window.validate(day(2024, 1, 1), day(2024, 1, 1)), WindowState::InvalidOrder);
    }

    #[test]
    fn span_counts_whole_days_only() {
        let mut window = TimeWindow::new(5);
        let start = day(2024, 1, 1);
        let end = day(2024, 1, 6) + chrono::Duration::hours(23);
        // 5 天 23 小时按整天计为 5 天
        assert_eq!(window.validate(start, end), WindowState::Valid);
        assert_eq!(window.validate(start, day(2024, 1, 7)), WindowState::WindowTooLarge);
    }

    #[test]
    fn later_validation_overwrites_state() {
        let mut window = TimeWindow::new(31);
        window.validate(day(2024, 1, 1), day(2024, 1, 10));
        assert!(window.is_valid());
        window.validate(day(2024, 2, 1), day(2024, 1, 10));
        assert_eq!(window.state(), WindowState::InvalidOrder);
        assert!(window.bounds().is_none());
    }
}
