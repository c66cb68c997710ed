//! The `object_tool` command line.

use std::{
    borrow::Borrow,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use thiserror::Error;

use crate::{
    introspect::IntrospectObject,
    loader::{MachFile, MachOLoader},
    machine::CpuType,
    macho::{MachOErr, MachObject},
};

/// object_tool - inspect and change Mach-O binaries
#[derive(Parser, Debug)]
#[command(name = "object_tool")]
#[command(about = "Inspect and change Mach-O binaries")]
#[command(version)]
pub struct Cli {
    /// File to inspect (executable, library or plug-in).
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Write changes to this file.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Print every load command.
    #[arg(short = 'l', long)]
    list_cmds: bool,

    /// Print LC_RPATH entries.
    #[arg(short = 'r', long)]
    list_relative_paths: bool,

    /// Print LC_LOAD_DYLIB paths.
    #[arg(short = 'L', long)]
    list_load_paths: bool,

    /// Print LC_REEXPORT_DYLIB paths.
    #[arg(short = 'e', long)]
    list_reexport_paths: bool,

    /// Print LC_LOAD_WEAK_DYLIB paths.
    #[arg(long)]
    list_weak_paths: bool,

    /// Print load, weak, reexport and rpath entries.
    #[arg(short = 'a', long)]
    list_all_paths: bool,

    /// Print the LC_ID_DYLIB install name.
    #[arg(long)]
    list_id: bool,

    /// Print the platform and tool versions the file was built for.
    #[arg(long)]
    target_info: bool,

    /// Replace the rpath --old-path with --new-path.
    #[arg(long, requires_all = ["old_path", "new_path"])]
    change_rpath: bool,

    /// Replace the dependency --old-path with --new-path.
    #[arg(long, requires_all = ["old_path", "new_path"])]
    change_dylib_path: bool,

    #[arg(long)]
    old_path: Option<String>,

    #[arg(long)]
    new_path: Option<String>,

    /// Set the LC_ID_DYLIB install name.
    #[arg(long, value_name = "PATH")]
    change_id: Option<String>,

    /// Add an LC_RPATH entry.
    #[arg(long, value_name = "PATH")]
    add_rpath: Option<String>,

    /// Remove an LC_RPATH entry.
    #[arg(long, value_name = "PATH")]
    remove_rpath: Option<String>,

    /// Write the --arch slice of a fat file as a thin file.
    #[arg(long, requires = "arch")]
    extract_arch: bool,

    /// Select this architecture in a fat binary (x86_64, arm64, i386, ppc, ...).
    #[arg(long)]
    arch: Option<String>,

    /// Overwrite an existing output file.
    #[arg(long)]
    force_overwrite: bool,

    /// Allow the output to be the input file.
    #[arg(long)]
    force_overwrite_src: bool,
}

impl Cli {
    fn mutates(&self) -> bool {
        self.change_rpath
            || self.change_dylib_path
            || self.change_id.is_some()
            || self.add_rpath.is_some()
            || self.remove_rpath.is_some()
    }

    fn lists(&self) -> bool {
        self.list_cmds
            || self.list_relative_paths
            || self.list_load_paths
            || self.list_reexport_paths
            || self.list_weak_paths
            || self.list_all_paths
            || self.list_id
            || self.target_info
    }

    fn path_pair(&self) -> Result<(&str, &str), ToolError> {
        match (self.old_path.as_deref(), self.new_path.as_deref()) {
            (Some(old), Some(new)) => Ok((old, new)),
            _ => Err(ToolError::Usage(
                "--old-path and --new-path are both required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Overwrite(String),
    #[error(transparent)]
    MachO(#[from] MachOErr),
}

impl ToolError {
    /// 1 for usage and overwrite refusals, 2 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Usage(_) | ToolError::Overwrite(_) => 1,
            ToolError::MachO(_) => 2,
        }
    }
}

/// Carries out every action requested on the command line.
pub fn run(cli: &Cli) -> Result<(), ToolError> {
    if !cli.mutates() && !cli.extract_arch && !cli.lists() {
        return Err(ToolError::Usage(
            "nothing to do, see --help for the available actions".to_string(),
        ));
    }
    if (cli.mutates() || cli.extract_arch) && cli.output.is_none() {
        return Err(ToolError::Usage("changes require --output".to_string()));
    }
    if !cli.input.exists() {
        return Err(MachOErr::NotFound(format!("file '{}'", cli.input.display())).into());
    }
    if let Some(output) = &cli.output {
        check_overwrite(cli, output)?;
    }

    let cpu = cli.arch.as_deref().map(parse_arch).transpose()?;
    let mut loader = MachOLoader::open(&cli.input)?;

    if cli.lists() {
        let objects = selected(loader.file().objects(), cpu)?;
        let heading = objects.len() > 1;
        for object in objects {
            if heading {
                println!("Architecture {}", object.header().describe_cpu());
            }
            print_listing(cli, object)?;
        }
    }

    if cli.mutates() {
        let objects = selected(loader.file_mut().objects_mut(), cpu)?;
        for object in objects {
            apply_changes(cli, object)?;
        }
    }

    let Some(output) = &cli.output else {
        return Ok(());
    };

    if cli.extract_arch {
        let cpu =
            cpu.ok_or_else(|| ToolError::Usage("--extract-arch requires --arch".to_string()))?;
        let object = match loader.into_file() {
            MachFile::Fat(fat) => fat.into_object(cpu)?,
            MachFile::Object(object) if is_arch(&object, Some(cpu)) => object,
            MachFile::Object(_) => return Err(MachOErr::ArchNotFound(cpu.to_string()).into()),
        };
        MachFile::Object(object).write_to_path(output, true)?;
    } else {
        loader.write(output, true)?;
    }
    Ok(())
}

fn check_overwrite(cli: &Cli, output: &Path) -> Result<(), ToolError> {
    if same_file(&cli.input, output) {
        if !cli.force_overwrite_src {
            return Err(ToolError::Overwrite(
                "not allowed to overwrite the source file, try again with --force-overwrite-src"
                    .to_string(),
            ));
        }
    } else if output.exists() && !cli.force_overwrite {
        return Err(ToolError::Overwrite(format!(
            "not allowed to overwrite existing file '{}', try again with --force-overwrite",
            output.display()
        )));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn parse_arch(name: &str) -> Result<CpuType, ToolError> {
    CpuType::from_str(name).map_err(|_| MachOErr::ArchNotFound(name.to_string()).into())
}

fn is_arch(object: &MachObject, cpu: Option<CpuType>) -> bool {
    cpu.map_or(true, |cpu| object.header().cputype() == cpu as u32)
}

/// Slices matching `cpu`, every slice when no arch was given.
fn selected<O: Borrow<MachObject>>(
    objects: Vec<O>,
    cpu: Option<CpuType>,
) -> Result<Vec<O>, ToolError> {
    let objects: Vec<O> = objects
        .into_iter()
        .filter(|object| is_arch(<O as Borrow<MachObject>>::borrow(object), cpu))
        .collect();
    match (objects.is_empty(), cpu) {
        (true, Some(cpu)) => Err(MachOErr::ArchNotFound(cpu.to_string()).into()),
        _ => Ok(objects),
    }
}

fn print_paths(heading: &str, paths: &[String]) {
    println!("{}", heading);
    for path in paths {
        println!("  {}", path);
    }
}

fn print_listing(cli: &Cli, object: &MachObject) -> Result<(), ToolError> {
    let all = cli.list_all_paths;
    if cli.list_id {
        let id: Vec<String> = object.id()?.into_iter().collect();
        print_paths("LC_ID_DYLIB", &id);
    }
    if cli.list_load_paths || all {
        print_paths("LC_LOAD", &object.load_dylib_paths()?);
    }
    if cli.list_weak_paths || all {
        print_paths("LC_WEAK_LOAD", &object.weak_load_dylib_paths()?);
    }
    if cli.list_reexport_paths || all {
        print_paths("LC_REEXPORT", &object.reexport_dylib_paths()?);
    }
    if cli.list_relative_paths || all {
        print_paths("LC_RPATH", &object.rpaths()?);
    }

    let introspect = IntrospectObject::new(object);
    if cli.target_info {
        print!("{}", introspect.target_info()?);
    }
    if cli.list_cmds {
        println!("Load commands for: {}", cli.input.display());
        print!("{}", introspect.header_info());
        print!("{}", introspect.load_cmds()?);
    }
    Ok(())
}

fn apply_changes(cli: &Cli, object: &mut MachObject) -> Result<(), ToolError> {
    if cli.change_rpath {
        let (old, new) = cli.path_pair()?;
        object.change_rpath(old, new)?;
    }
    if cli.change_dylib_path {
        let (old, new) = cli.path_pair()?;
        object.change_dylib_path(old, new)?;
    }
    if let Some(id) = &cli.change_id {
        object.change_id(id)?;
    }
    if let Some(path) = &cli.remove_rpath {
        object.remove_rpath(path)?;
    }
    if let Some(path) = &cli.add_rpath {
        object.add_rpath(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fat::FatObject, testutil::*};
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("object_tool").chain(args.iter().copied())).unwrap()
    }

    fn scratch(name: &str, image: Vec<u8>) -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, image).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    fn sibling(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ToolError::Usage("x".to_string()).exit_code(), 1);
        assert_eq!(ToolError::Overwrite("x".to_string()).exit_code(), 1);
        assert_eq!(ToolError::from(MachOErr::NotFound("x".to_string())).exit_code(), 2);
        assert_eq!(ToolError::from(MachOErr::BadMagic(0)).exit_code(), 2);
    }

    #[test]
    fn test_requires_an_action() {
        let (_dir, input) = scratch("libexample.dylib", x86_64_dylib());
        let err = run(&cli(&["-i", &input])).unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_changes_require_output() {
        let (_dir, input) = scratch("libexample.dylib", x86_64_dylib());
        assert!(matches!(
            run(&cli(&["-i", &input, "--add-rpath", "/opt/lib"])),
            Err(ToolError::Usage(_))
        ));
        assert!(matches!(
            run(&cli(&["-i", &input, "--extract-arch", "--arch", "x86_64"])),
            Err(ToolError::Usage(_))
        ));
        assert_eq!(fs::read(&input).unwrap(), x86_64_dylib());
    }

    #[test]
    fn test_path_changes_need_both_paths() {
        let args = ["object_tool", "-i", "in", "-o", "out", "--change-rpath", "--old-path", "/a"];
        assert!(Cli::try_parse_from(args).is_err());
        let args = ["object_tool", "-i", "in", "--extract-arch"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = sibling(&dir, "missing.dylib");
        let err = run(&cli(&["-i", &input, "-l"])).unwrap_err();
        assert!(matches!(err, ToolError::MachO(MachOErr::NotFound(_))));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_listing_is_read_only() {
        let (_dir, input) = scratch("libexample.dylib", universal_dylib());
        run(&cli(&["-i", &input, "-l", "-a", "--list-id", "--target-info"])).unwrap();
        run(&cli(&["-i", &input, "-r", "--arch", "arm64"])).unwrap();
        assert_eq!(fs::read(&input).unwrap(), universal_dylib());
    }

    #[test]
    fn test_overwrite_rules() {
        let (dir, input) = scratch("libexample.dylib", x86_64_dylib());
        let output = sibling(&dir, "libexample.patched.dylib");
        fs::write(&output, b"placeholder").unwrap();

        let err = run(&cli(&["-i", &input, "-o", &input, "--add-rpath", "/opt/lib"])).unwrap_err();
        assert!(matches!(err, ToolError::Overwrite(_)));
        assert_eq!(err.exit_code(), 1);

        let err = run(&cli(&["-i", &input, "-o", &output, "--add-rpath", "/opt/lib"])).unwrap_err();
        assert!(matches!(err, ToolError::Overwrite(_)));
        assert_eq!(fs::read(&output).unwrap(), b"placeholder");

        // --force-overwrite does not cover the source
        let err = run(&cli(&[
            "-i",
            &input,
            "-o",
            &input,
            "--add-rpath",
            "/opt/lib",
            "--force-overwrite",
        ]))
        .unwrap_err();
        assert!(matches!(err, ToolError::Overwrite(_)));
        assert_eq!(fs::read(&input).unwrap(), x86_64_dylib());

        run(&cli(&[
            "-i",
            &input,
            "-o",
            &output,
            "--add-rpath",
            "/opt/lib",
            "--force-overwrite",
        ]))
        .unwrap();
        let patched = MachOLoader::open(&output).unwrap();
        assert_eq!(
            patched.file().objects()[0].rpaths().unwrap(),
            vec![DEFAULT_RPATH, "/opt/lib"]
        );
    }

    #[test]
    fn test_overwrite_source() {
        let (_dir, input) = scratch("libexample.dylib", x86_64_dylib());
        run(&cli(&[
            "-i",
            &input,
            "-o",
            &input,
            "--change-id",
            "@rpath/librenamed.dylib",
            "--force-overwrite-src",
        ]))
        .unwrap();
        let patched = MachOLoader::open(&input).unwrap();
        assert_eq!(
            patched.file().objects()[0].id().unwrap().as_deref(),
            Some("@rpath/librenamed.dylib")
        );
    }

    #[test]
    fn test_refused_change_keeps_source() {
        let (_dir, input) = scratch("libexample.dylib", x86_64_dylib());
        let long = "/".repeat(0x1000);
        let err = run(&cli(&[
            "-i",
            &input,
            "-o",
            &input,
            "--add-rpath",
            &long,
            "--force-overwrite-src",
        ]))
        .unwrap_err();
        assert!(matches!(err, ToolError::MachO(MachOErr::HeaderPadding { .. })));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(fs::read(&input).unwrap(), x86_64_dylib());
    }

    #[test]
    fn test_missing_change_target() {
        let (dir, input) = scratch("libexample.dylib", x86_64_dylib());
        let output = sibling(&dir, "out.dylib");
        let err = run(&cli(&["-i", &input, "-o", &output, "--remove-rpath", "/missing"]))
            .unwrap_err();
        assert!(matches!(err, ToolError::MachO(MachOErr::NotFound(_))));
        assert!(!Path::new(&output).exists());
    }

    #[test]
    fn test_arch_selection() {
        let (dir, thin) = scratch("libexample.dylib", x86_64_dylib());
        let err = run(&cli(&["-i", &thin, "-l", "--arch", "arm64"])).unwrap_err();
        assert!(matches!(err, ToolError::MachO(MachOErr::ArchNotFound(_))));
        assert_eq!(err.exit_code(), 2);
        assert!(matches!(
            run(&cli(&["-i", &thin, "-l", "--arch", "nonesuch"])),
            Err(ToolError::MachO(MachOErr::ArchNotFound(_)))
        ));

        let fat = sibling(&dir, "libexample.universal.dylib");
        let output = sibling(&dir, "libexample.patched.dylib");
        fs::write(&fat, universal_dylib()).unwrap();
        run(&cli(&["-i", &fat, "-o", &output, "--arch", "arm64", "--add-rpath", "/opt/lib"]))
            .unwrap();

        let patched = match MachOLoader::open(&output).unwrap().into_file() {
            MachFile::Fat(fat) => fat,
            MachFile::Object(_) => panic!("expected a fat file"),
        };
        let rpaths = |fat: &FatObject, cpu: CpuType| fat.object_for(cpu).unwrap().rpaths().unwrap();
        assert_eq!(rpaths(&patched, CpuType::X86_64), vec![DEFAULT_RPATH]);
        assert_eq!(rpaths(&patched, CpuType::Arm64), vec![DEFAULT_RPATH, "/opt/lib"]);
    }

    #[test]
    fn test_extract_arch() {
        let (dir, fat) = scratch("libexample.universal.dylib", universal_dylib());
        let output = sibling(&dir, "libexample.arm64.dylib");
        run(&cli(&["-i", &fat, "-o", &output, "--extract-arch", "--arch", "arm64"])).unwrap();
        assert_eq!(fs::read(&output).unwrap(), arm64_dylib());

        let thin = sibling(&dir, "libexample.x86_64.dylib");
        fs::write(&thin, x86_64_dylib()).unwrap();
        let mismatch = sibling(&dir, "libexample.ppc.dylib");
        let err = run(&cli(&["-i", &thin, "-o", &mismatch, "--extract-arch", "--arch", "arm64"]))
            .unwrap_err();
        assert!(matches!(err, ToolError::MachO(MachOErr::ArchNotFound(_))));
        assert!(!Path::new(&mismatch).exists());

        let copy = sibling(&dir, "libexample.copy.dylib");
        run(&cli(&["-i", &thin, "-o", &copy, "--extract-arch", "--arch", "x86_64"])).unwrap();
        assert_eq!(fs::read(&copy).unwrap(), x86_64_dylib());
    }
}
