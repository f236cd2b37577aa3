//! Decisions the pipeline needs from the user.
//!
//! The terminal front end answers these with modal dialogs; tests answer them
//! from a script.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Yes,
    No,
}

/// Answer to "the target already exists, what now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the existing file.
    Overwrite,
    /// Keep the existing file and write under a new name.
    Rename,
    /// Do nothing.
    Skip,
}

pub trait Confirm {
    fn ask_yes_no(&mut self, title: &str, message: &str, detail: Option<&str>) -> Decision;

    fn ask_resolution(&mut self, title: &str, message: &str, detail: Option<&str>) -> Resolution;
}
