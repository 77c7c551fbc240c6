//! Classpath resolution as seen through the launcher command line.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use forkharness::{ClassName, ForkLauncher, SearchPathLoader};
use zip::write::SimpleFileOptions;

fn write_jar(path: &Path, entries: &[&str]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for entry in entries {
        writer.start_file(*entry, SimpleFileOptions::default()).unwrap();
        writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
    }
    writer.finish().unwrap();
}

fn cp_entries(launcher: &ForkLauncher) -> Vec<PathBuf> {
    let spec = launcher.command_spec().unwrap();
    let idx = spec.args.iter().position(|a| a == "-cp").unwrap();
    std::env::split_paths(&spec.args[idx + 1]).collect()
}

#[test]
fn classes_resolve_to_their_roots_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("lib with space.jar");
    write_jar(&jar, &["com/acme/Widget.class"]);

    let classes = dir.path().join("build dir/classes");
    std::fs::create_dir_all(classes.join("org/example")).unwrap();
    std::fs::write(classes.join("org/example/Main.class"), b"").unwrap();

    let loader = SearchPathLoader::new([classes.clone(), jar.clone()]);
    let mut launcher = ForkLauncher::new();
    launcher
        .add_classpath_class(&ClassName::new("com.acme.Widget").unwrap(), &loader)
        .unwrap()
        .add_classpath_class(&ClassName::new("org.example.Main").unwrap(), &loader)
        .unwrap()
        .add_classpath_class(&ClassName::new("org.example.Missing").unwrap(), &loader)
        .unwrap();

    assert_eq!(launcher.classpath(), [jar.clone(), classes.clone()]);
    assert_eq!(cp_entries(&launcher), [jar, classes]);
}

#[test]
fn nested_class_resolves_through_its_own_resource() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("app.jar");
    write_jar(&jar, &["com/acme/Outer$Inner.class"]);

    let loader = SearchPathLoader::new([&jar]);
    let mut launcher = ForkLauncher::new();
    launcher
        .add_classpath_class(&ClassName::new("com.acme.Outer$Inner").unwrap(), &loader)
        .unwrap();

    assert_eq!(launcher.classpath(), [jar]);
}
