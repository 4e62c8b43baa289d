use clap::Parser;
use pastedown::cli::{Cli, Commands};

#[test]
fn apply_flag_parsing() {
    // Given
    let argv = vec![
        "pastedown",
        "apply",
        "--response-file",
        "reply.txt",
        "--root",
        "proj",
        "--yes",
        "--sequential",
        "--no-fuzzy",
    ];

    // When
    let cmd = Cli::parse_from(argv);

    // Then
    match cmd.command {
        Commands::Apply(args) => {
            assert!(args.yes);
            assert!(args.sequential);
            assert!(args.no_fuzzy);
            assert!(!args.from_clipboard);
            let p = args.response_file.expect("flag should be captured");
            assert!(p.to_string_lossy().ends_with("reply.txt"));
            assert_eq!(args.root.to_string_lossy(), "proj");
        }
        _ => panic!("expected Apply command"),
    }
}

#[test]
fn global_flags_are_global() {
    let argv = vec!["pastedown", "--quiet", "--dry-run", "preview", "--json"];
    let cmd = Cli::parse_from(argv);

    assert!(cmd.quiet);
    assert!(cmd.dry_run);
    match cmd.command {
        Commands::Preview(args) => assert!(args.json),
        _ => panic!("expected Preview command"),
    }
}
