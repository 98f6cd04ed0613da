use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_up_parses_limits_and_scope() {
    let cli = Cli::try_parse_from(["tern", "up", "--to", "20240101120000", "-s", "billing/eu"])
        .unwrap();
    let Commands::Up(args) = cli.command else {
        panic!("expected up");
    };
    assert_eq!(args.to, Some(UnitId::new(20240101120000)));
    assert_eq!(args.count, None);
    assert_eq!(args.scope.unwrap().to_string(), "billing/eu");
}

#[test]
fn test_up_rejects_count_with_to() {
    assert!(Cli::try_parse_from(["tern", "up", "-n", "2", "--to", "5"]).is_err());
}

#[test]
fn test_down_all_conflicts_with_count() {
    assert!(Cli::try_parse_from(["tern", "down", "--all", "-n", "2"]).is_err());
    let cli = Cli::try_parse_from(["tern", "down", "--all"]).unwrap();
    assert!(matches!(cli.command, Commands::Down(DownArgs { all: true, .. })));
}

#[test]
fn test_invalid_scope_rejected() {
    assert!(Cli::try_parse_from(["tern", "status", "--scope", "../etc"]).is_err());
}

#[test]
fn test_invalid_id_rejected() {
    assert!(Cli::try_parse_from(["tern", "up", "--to", "yesterday"]).is_err());
}

#[test]
fn test_global_args_after_subcommand() {
    let cli = Cli::try_parse_from(["tern", "status", "-p", "proj", "--database", "db.duckdb", "-v"])
        .unwrap();
    assert_eq!(cli.global.project_dir, PathBuf::from("proj"));
    assert_eq!(cli.global.database.as_deref(), Some("db.duckdb"));
    assert!(cli.global.verbose);
}
