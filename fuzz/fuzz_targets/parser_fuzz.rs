#![no_main]
use libfuzzer_sys::fuzz_target;

const SUBCOMMANDS: [&str; 5] = ["create", "apply", "info", "config", ""];

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };

    // Steer most inputs into a real subcommand so flag parsing is reached.
    let mut args = Vec::<String>::new();
    let sub = SUBCOMMANDS[first as usize % SUBCOMMANDS.len()];
    if !sub.is_empty() {
        args.push(sub.to_string());
    }
    let text = String::from_utf8_lossy(rest);
    args.extend(text.split_whitespace().take(32).map(str::to_string));
    phdiff::cli::fuzz_try_parse_args(&args);
});
