use crate::args::ShellKind;
use crate::types::exit;
use anyhow::Result;

// OSC 133 A before the prompt, B after it. Only active inside a session.
const BASH_INIT: &str = r#"# betterhist: mark prompt boundaries (add to ~/.bashrc)
if [ -n "$BETTERHIST_SESSION" ] && [ -z "$BETTERHIST_MARKERS" ]; then
    BETTERHIST_MARKERS=1
    PS1='\[\e]133;A\a\]'"$PS1"'\[\e]133;B\a\]'
fi"#;

const ZSH_INIT: &str = r#"# betterhist: mark prompt boundaries (add to ~/.zshrc)
if [[ -n "$BETTERHIST_SESSION" && -z "$BETTERHIST_MARKERS" ]]; then
    BETTERHIST_MARKERS=1
    PS1=$'%{\e]133;A\a%}'"$PS1"$'%{\e]133;B\a%}'
fi"#;

pub fn snippet(shell: ShellKind) -> &'static str {
    match shell {
        ShellKind::Bash => BASH_INIT,
        ShellKind::Zsh => ZSH_INIT,
    }
}

pub fn handle(shell: ShellKind) -> Result<i32> {
    println!("{}", snippet(shell));
    Ok(exit::SUCCESS)
}
