/// Where key input is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Typing into the search box
    Input,
    /// Moving through the result list
    Results,
    /// Full-image viewer is open
    Viewer,
}

impl Focus {
    pub fn title(self) -> &'static str {
        match self {
            Focus::Input => "SEARCH",
            Focus::Results => "RESULTS",
            Focus::Viewer => "VIEWER",
        }
    }
}
