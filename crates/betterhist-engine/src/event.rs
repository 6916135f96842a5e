/// One item of the tapped session stream, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapEvent {
    /// Bytes the child wrote to the terminal.
    Output(Vec<u8>),
    /// Keystrokes the user sent to the child.
    Input(Vec<u8>),
    /// The stream has been quiet for a while.
    Idle,
    /// The tap could not keep up and this many bytes were not recorded.
    Gap { dropped_bytes: u64 },
    /// The child has exited.
    End,
}
