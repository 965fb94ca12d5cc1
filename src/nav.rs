// ── Frame navigation ────────────────────────────────────────────────────────

/// Backing state for the frame slider and the numeric entry. The two stay in
/// sync: every accepted update rewrites both the index and the entry text.
pub struct FrameNavigator {
    frame_count: usize,
    index: usize,
    entry: String,
}

impl FrameNavigator {
    /// `frame_count` must be at least 1; the video layer rejects files that
    /// report no decodable frames.
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            index: 0,
            entry: "0".to_string(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn max_index(&self) -> usize {
        self.frame_count - 1
    }

    pub fn entry_mut(&mut self) -> &mut String {
        &mut self.entry
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.max_index());
        self.entry = self.index.to_string();
    }

    pub fn prev(&mut self) {
        if self.index > 0 {
            self.set_index(self.index - 1);
        }
    }

    pub fn next(&mut self) {
        if self.index < self.max_index() {
            self.set_index(self.index + 1);
        }
    }

    /// Validates the entry text. Accepted values move the index; anything
    /// else restores the entry to the last valid index and returns the
    /// message to show the user.
    pub fn commit_entry(&mut self) -> Result<(), String> {
        match self.entry.trim().parse::<i64>() {
            Ok(value) if (0..self.frame_count as i64).contains(&value) => {
                self.set_index(value as usize);
                Ok(())
            }
            Ok(_) => {
                self.entry = self.index.to_string();
                Err(format!(
                    "Please enter a frame number between 0 and {}",
                    self.max_index()
                ))
            }
            Err(_) => {
                self.entry = self.index.to_string();
                Err("Please enter a valid number".to_string())
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_no_ops_at_the_boundaries() {
        let mut nav = FrameNavigator::new(3);
        nav.prev();
        assert_eq!(nav.index(), 0);

        nav.next();
        nav.next();
        assert_eq!(nav.index(), 2);
        nav.next();
        assert_eq!(nav.index(), 2);

        nav.prev();
        assert_eq!(nav.index(), 1);
    }

    #[test]
    fn index_and_entry_stay_in_sync() {
        let mut nav = FrameNavigator::new(100);
        nav.set_index(42);
        assert_eq!(nav.entry_mut().as_str(), "42");

        *nav.entry_mut() = "7".to_string();
        assert!(nav.commit_entry().is_ok());
        assert_eq!(nav.index(), 7);
        assert_eq!(nav.entry_mut().as_str(), "7");
    }

    #[test]
    fn out_of_range_entry_is_rejected_and_restored() {
        let mut nav = FrameNavigator::new(10);
        nav.set_index(4);

        *nav.entry_mut() = "10".to_string();
        let err = nav.commit_entry().unwrap_err();
        assert!(err.contains("between 0 and 9"));
        assert_eq!(nav.index(), 4);
        assert_eq!(nav.entry_mut().as_str(), "4");

        *nav.entry_mut() = "-1".to_string();
        assert!(nav.commit_entry().unwrap_err().contains("between 0 and 9"));
        assert_eq!(nav.index(), 4);
    }

    #[test]
    fn non_numeric_entry_is_rejected_and_restored() {
        let mut nav = FrameNavigator::new(10);
        nav.set_index(3);

        *nav.entry_mut() = "abc".to_string();
        let err = nav.commit_entry().unwrap_err();
        assert!(err.contains("valid number"));
        assert_eq!(nav.index(), 3);
        assert_eq!(nav.entry_mut().as_str(), "3");
    }

    #[test]
    fn index_never_leaves_range_under_mixed_operations() {
        let mut nav = FrameNavigator::new(5);
        for _ in 0..10 {
            nav.next();
            assert!(nav.index() <= nav.max_index());
        }
        *nav.entry_mut() = "2".to_string();
        nav.commit_entry().unwrap();
        for _ in 0..10 {
            nav.prev();
        }
        assert_eq!(nav.index(), 0);
    }
}
