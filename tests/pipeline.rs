//! End-to-end pipeline tests against real on-disk sources, exercising the
//! public `compile`/`load_config` entry points the way the CLI driver does
//! rather than reaching into any one subsystem directly.

use std::io::Write;

use ccfront::diagnostics::ErrorKind;
use ccfront::preprocess::BuildStamp;

fn stamp() -> BuildStamp {
    BuildStamp::new("Jan  1 1970", "00:00:00")
}

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn compiles_a_trivial_translation_unit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "main.c", "int main(void) { return 0; }\n");

    let config = ccfront::load_config(path).unwrap();
    let (program, messages) = ccfront::compile(&config, stamp()).unwrap();

    assert!(messages.errors.is_empty());
    assert_eq!(program.functions.len(), 1);
}

#[test]
fn resolves_a_quoted_include_next_to_the_source_file() {
    let dir = tempfile::tempdir().unwrap();
    write_source(&dir, "helper.h", "int helper(void) { return 7; }\n");
    let path = write_source(
        &dir,
        "main.c",
        "#include \"helper.h\"\nint main(void) { return helper(); }\n",
    );

    let config = ccfront::load_config(path).unwrap();
    let (program, messages) = ccfront::compile(&config, stamp()).unwrap();

    assert!(messages.errors.is_empty());
    assert_eq!(program.functions.len(), 2);
}

#[test]
fn object_like_macro_expands_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(
        &dir,
        "main.c",
        "#define ANSWER 42\nint main(void) { return ANSWER; }\n",
    );

    let config = ccfront::load_config(path).unwrap();
    let (program, messages) = ccfront::compile(&config, stamp()).unwrap();
    assert!(messages.errors.is_empty());

    let f = &program.functions[0].1;
    let ops: Vec<_> = f.block_instructions(f.entry).map(|id| &f.ins(id).op).collect();
    assert!(ops.iter().any(|op| matches!(op, ccfront::ir::Op::Imm(42))));
}

#[test]
fn ccfront_toml_next_to_the_source_adds_an_include_path() {
    let dir = tempfile::tempdir().unwrap();
    let inc_dir = dir.path().join("vendor");
    std::fs::create_dir(&inc_dir).unwrap();
    std::fs::write(inc_dir.join("lib.h"), "int lib(void) { return 1; }\n").unwrap();
    std::fs::write(
        dir.path().join("ccfront.toml"),
        format!("include_paths = [\"{}\"]\n", inc_dir.display()),
    )
    .unwrap();
    let path = write_source(&dir, "main.c", "#include <lib.h>\nint main(void) { return lib(); }\n");

    let config = ccfront::load_config(path).unwrap();
    assert!(config.include_paths.iter().any(|p| p == &inc_dir));

    let (_program, messages) = ccfront::compile(&config, stamp()).unwrap();
    assert!(messages.errors.is_empty());
}

#[test]
fn use_of_an_undeclared_identifier_is_a_semantic_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "main.c", "int main(void) { return not_declared; }\n");

    let config = ccfront::load_config(path).unwrap();
    let messages = ccfront::compile(&config, stamp()).unwrap_err();

    assert_eq!(messages.errors.len(), 1);
    assert_eq!(messages.errors[0].kind, ErrorKind::Semantic);
}

#[test]
fn missing_input_file_is_reported_rather_than_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.c");

    let config = ccfront::load_config(missing).unwrap();
    let messages = ccfront::compile(&config, stamp()).unwrap_err();

    assert_eq!(messages.errors.len(), 1);
    assert_eq!(messages.errors[0].kind, ErrorKind::Internal);
}
