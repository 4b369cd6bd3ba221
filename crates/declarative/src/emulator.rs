//! Type emulator: turns a type invocation inside a manifest into an object
//!
//! Manifests call types like commands (`__file /etc/motd --mode 0644`).
//! Each call lands here through a shim on `PATH`. The emulator parses the
//! arguments against the type's parameter declaration, then creates the
//! object or checks it against an earlier identical declaration, and
//! finally records requirements, creation order and piped input.

use crate::env;
use crate::error::{Error, Result};
use crate::layout::LocalLayout;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use store::{
    fsprop, sanitise_object_id, split_name, Object, ObjectStore, ParamValue, Parameters, Type,
    TypeRegistry,
};

const OBJECT_ID_ARG: &str = "__object_id";

/// What the emulator learns from its environment.
#[derive(Debug, Clone)]
pub struct EmulatorEnv {
    pub global: PathBuf,
    /// Manifest currently running, recorded as the object's source.
    pub manifest: String,
    pub type_base_path: PathBuf,
    pub marker: String,
    pub target_host: String,
    /// Object whose type manifest is running, if any.
    pub parent: Option<String>,
    /// Requirement patterns from `require`.
    pub require: Vec<String>,
    pub order_dependency: bool,
    pub override_declarations: bool,
}

impl EmulatorEnv {
    pub fn from_vars(vars: &BTreeMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            vars.get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| Error::MissingEnvironment(key.to_string()))
        };

        Ok(Self {
            global: PathBuf::from(required(env::GLOBAL)?),
            manifest: required(env::CDIST_MANIFEST)?,
            type_base_path: PathBuf::from(required(env::TYPE_BASE_PATH)?),
            marker: required(env::OBJECT_MARKER)?,
            target_host: required(env::TARGET_HOST)?,
            parent: vars
                .get(env::OBJECT_NAME)
                .filter(|name| !name.is_empty())
                .cloned(),
            require: vars
                .get(env::REQUIRE)
                .map(|value| value.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            order_dependency: vars.contains_key(env::ORDER_DEPENDENCY),
            override_declarations: vars.contains_key(env::OVERRIDE),
        })
    }
}

pub struct Emulator {
    env: EmulatorEnv,
    store: ObjectStore,
    layout: LocalLayout,
}

impl Emulator {
    pub fn new(env: EmulatorEnv) -> Self {
        let layout = LocalLayout::new(&env.global);
        let types = Arc::new(TypeRegistry::new(&env.type_base_path));
        let store = ObjectStore::new(layout.object_path(), env.marker.clone(), types);
        Self { env, store, layout }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Declare one object of `type_name` from its command line.
    pub fn run(
        &self,
        type_name: &str,
        args: &[String],
        stdin: Option<&mut dyn Read>,
    ) -> Result<Object> {
        let ty = self.store.load_type(type_name)?;
        let (object_id, parameters) = parse_arguments(&ty, args)?;
        let object = self
            .store
            .object(type_name, sanitise_object_id(&object_id))?;
        warn_deprecated(&ty, &parameters);

        let parent = self
            .env
            .parent
            .as_deref()
            .map(|name| self.store.object_from_name(name))
            .transpose()?;

        let _lock = self.store.lock(&object)?;
        // Siblings declared by concurrent manifests append to the same parent files.
        let _parent_lock = parent
            .as_ref()
            .filter(|parent| parent.name() != object.name())
            .map(|parent| self.store.lock(parent))
            .transpose()?;
        let predecessor = self.declare(&object, &parameters, parent.as_ref())?;
        object.append_source(&self.env.manifest)?;
        self.record_requirements(&object, predecessor)?;
        if let Some(parent) = &parent {
            record_autorequire(&object, parent)?;
        }
        if let Some(stdin) = stdin {
            save_stdin(&object, stdin)?;
        }
        log::debug!("Declared {} on {}", object.name(), self.env.target_host);
        Ok(object)
    }

    /// Create the object, or accept an identical redeclaration.
    ///
    /// Returns the object declared just before this one in the same
    /// scope when order dependencies are on.
    fn declare(
        &self,
        object: &Object,
        parameters: &Parameters,
        parent: Option<&Object>,
    ) -> Result<Option<String>> {
        if object.exists() && !self.env.override_declarations {
            let existing = object.parameters()?;
            if existing != *parameters {
                return Err(Error::ConflictingParameters {
                    object: object.name().to_string(),
                    existing_sources: object.source()?,
                    existing: describe(&existing),
                    new_source: self.env.manifest.clone(),
                    new: describe(parameters),
                });
            }
            log::debug!("{} already declared with the same parameters", object.name());
            return Ok(None);
        }

        if object.exists() {
            log::debug!("Overriding {}", object.name());
            object.create(true)?;
        } else {
            object.create(false)?;
        }
        object.set_parameters(parameters)?;

        fsprop::append_line(&self.layout.typeorder_path(), object.name())?;
        if let Some(parent) = parent {
            parent.append_typeorder(object.name())?;
        }

        if !self.env.order_dependency {
            return Ok(None);
        }
        let scope = parent.map_or_else(
            || self.layout.typeorder_dep_path(),
            Object::typeorder_dep_path,
        );
        let predecessor = if self.env.override_declarations {
            None
        } else {
            fsprop::read_lines(&scope)?.pop()
        };
        fsprop::append_line(&scope, object.name())?;
        Ok(predecessor)
    }

    fn record_requirements(&self, object: &Object, predecessor: Option<String>) -> Result<()> {
        for requirement in &self.env.require {
            let (type_name, object_id) = split_name(requirement);
            let required = self
                .store
                .object(type_name, sanitise_object_id(object_id))?;
            log::trace!("{} requires {}", object.name(), required.name());
            object.add_requirement(required.name())?;
        }
        if let Some(predecessor) = predecessor {
            log::trace!("{} ordered after {predecessor}", object.name());
            object.add_requirement(&predecessor)?;
        }
        Ok(())
    }
}

/// The parent's manifest created `object`, unless that would form a cycle.
fn record_autorequire(object: &Object, parent: &Object) -> Result<()> {
    if object.requirements()?.iter().any(|name| name == parent.name()) {
        return Ok(());
    }
    parent.add_autorequire(object.name())?;
    Ok(())
}

fn save_stdin(object: &Object, stdin: &mut dyn Read) -> Result<()> {
    let path = object.stdin_path();
    let mut data = Vec::new();
    stdin
        .read_to_end(&mut data)
        .map_err(|e| Error::io(&path, e))?;
    if data.is_empty() {
        return Ok(());
    }
    std::fs::write(&path, data).map_err(|e| Error::io(&path, e))
}

fn option(name: &str) -> Arg {
    Arg::new(name.to_string()).long(name.to_string())
}

/// Command line grammar of a type.
fn command(ty: &Type) -> Command {
    let mut command = Command::new(ty.name().to_string())
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true);

    if !ty.is_singleton() {
        command = command.arg(
            Arg::new(OBJECT_ID_ARG)
                .value_name("object_id")
                .required(true),
        );
    }
    for name in ty.required_parameters() {
        command = command.arg(
            option(name)
                .required(true)
                .allow_hyphen_values(true)
                .action(ArgAction::Set),
        );
    }
    for name in ty.required_multiple_parameters() {
        command = command.arg(
            option(name)
                .required(true)
                .allow_hyphen_values(true)
                .action(ArgAction::Append),
        );
    }

    let defaults = ty.parameter_defaults();
    for name in ty.optional_parameters() {
        let mut arg = option(name)
            .allow_hyphen_values(true)
            .action(ArgAction::Set);
        if let Some(default) = defaults.get(name) {
            arg = arg.default_value(default.clone());
        }
        command = command.arg(arg);
    }
    for name in ty.optional_multiple_parameters() {
        let mut arg = option(name)
            .allow_hyphen_values(true)
            .action(ArgAction::Append);
        if let Some(default) = defaults.get(name) {
            arg = arg.default_values(default.lines().map(str::to_string).collect::<Vec<_>>());
        }
        command = command.arg(arg);
    }
    for name in ty.boolean_parameters() {
        command = command.arg(option(name).action(ArgAction::SetTrue));
    }
    command
}

/// Object id and parameters from a type's command line.
fn parse_arguments(ty: &Type, args: &[String]) -> Result<(String, Parameters)> {
    let matches = command(ty)
        .try_get_matches_from(args)
        .map_err(|e| Error::Arguments(format!("{}: {}", ty.name(), e.render())))?;

    let object_id = matches
        .get_one::<String>(OBJECT_ID_ARG)
        .cloned()
        .unwrap_or_default();
    Ok((object_id, collect_parameters(ty, &matches)))
}

fn collect_parameters(ty: &Type, matches: &ArgMatches) -> Parameters {
    let mut parameters = Parameters::new();
    for name in ty
        .required_parameters()
        .iter()
        .chain(ty.optional_parameters())
    {
        if let Some(value) = matches.get_one::<String>(name) {
            parameters.insert(name.clone(), ParamValue::Single(value.clone()));
        }
    }
    for name in ty
        .required_multiple_parameters()
        .iter()
        .chain(ty.optional_multiple_parameters())
    {
        if let Some(values) = matches.get_many::<String>(name) {
            parameters.insert(name.clone(), ParamValue::Multiple(values.cloned().collect()));
        }
    }
    for name in ty.boolean_parameters() {
        if matches.get_flag(name) {
            parameters.insert(name.clone(), ParamValue::Flag);
        }
    }
    parameters
}

fn warn_deprecated(ty: &Type, parameters: &Parameters) {
    if let Some(message) = ty.deprecated() {
        if message.is_empty() {
            log::warn!("{} is deprecated", ty.name());
        } else {
            log::warn!("{} is deprecated: {message}", ty.name());
        }
    }
    for (name, message) in ty.deprecated_parameters() {
        if parameters.contains_key(name) {
            log::warn!("{}: parameter --{name} is deprecated: {message}", ty.name());
        }
    }
}

fn describe(parameters: &Parameters) -> String {
    if parameters.is_empty() {
        return "(no parameters)".to_string();
    }
    parameters
        .iter()
        .map(|(key, value)| format!("--{key} {value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{fixture, Fixture};
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    const MANIFEST: &str = "/conf/manifest/init";

    fn emulator(f: &Fixture, extra: &[(&str, &str)]) -> Emulator {
        let mut vars = f.session.manifest_env(Path::new(MANIFEST));
        for (key, value) in extra {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        Emulator::new(EmulatorEnv::from_vars(&vars).unwrap())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn file_type(f: &Fixture) {
        f.write_type(
            "__file",
            &[
                ("parameter/optional", "mode\nowner\n"),
                ("parameter/optional_multiple", "tag\n"),
                ("parameter/boolean", "force\n"),
                ("parameter/default/mode", "0644\n"),
            ],
        );
    }

    #[test]
    fn test_missing_environment() {
        let err = EmulatorEnv::from_vars(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::MissingEnvironment(ref key) if key == env::GLOBAL));
    }

    #[test]
    fn test_declare_object() {
        let f = fixture();
        file_type(&f);
        f.scaffold();

        let object = emulator(&f, &[])
            .run(
                "__file",
                &args(&["/etc/motd", "--owner", "root", "--tag", "a", "--tag", "-b"]),
                None,
            )
            .unwrap();

        assert_eq!(object.name(), "__file/etc/motd");
        let parameters = object.parameters().unwrap();
        assert_eq!(parameters["mode"], ParamValue::Single("0644".into()));
        assert_eq!(parameters["owner"], ParamValue::Single("root".into()));
        assert_eq!(
            parameters["tag"],
            ParamValue::Multiple(vec!["a".into(), "-b".into()])
        );
        assert!(!parameters.contains_key("force"));
        assert_eq!(object.source().unwrap(), vec![MANIFEST]);
        assert_eq!(
            fsprop::read_lines(&f.session.local().typeorder_path()).unwrap(),
            vec!["__file/etc/motd"]
        );
        assert_eq!(f.session.store().list_names().unwrap(), vec!["__file/etc/motd"]);
    }

    #[test]
    fn test_identical_redeclaration() {
        let f = fixture();
        file_type(&f);
        f.scaffold();
        let emulator = emulator(&f, &[]);

        emulator.run("__file", &args(&["etc/motd", "--force"]), None).unwrap();
        let object = emulator
            .run("__file", &args(&["/etc/motd/", "--force"]), None)
            .unwrap();
        assert_eq!(object.source().unwrap().len(), 2);
        assert_eq!(object.parameters().unwrap()["force"], ParamValue::Flag);
    }

    #[test]
    fn test_conflicting_redeclaration() {
        let f = fixture();
        file_type(&f);
        f.scaffold();
        let emulator = emulator(&f, &[]);

        emulator.run("__file", &args(&["etc/motd", "--mode", "0600"]), None).unwrap();
        let err = emulator
            .run("__file", &args(&["etc/motd", "--mode", "0644"]), None)
            .unwrap_err();
        match err {
            Error::ConflictingParameters {
                object,
                existing_sources,
                ..
            } => {
                assert_eq!(object, "__file/etc/motd");
                assert_eq!(existing_sources, vec![MANIFEST]);
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_override_replaces_declaration() {
        let f = fixture();
        file_type(&f);
        f.scaffold();

        emulator(&f, &[])
            .run("__file", &args(&["etc/motd", "--mode", "0600"]), None)
            .unwrap();
        let object = emulator(&f, &[(env::OVERRIDE, "yes")])
            .run("__file", &args(&["etc/motd", "--owner", "root"]), None)
            .unwrap();

        let parameters = object.parameters().unwrap();
        assert_eq!(parameters["mode"], ParamValue::Single("0644".into()));
        assert_eq!(parameters["owner"], ParamValue::Single("root".into()));
    }

    #[test]
    fn test_argument_errors() {
        let f = fixture();
        f.write_type("__user", &[("parameter/required", "uid\n")]);
        f.write_type("__motd", &[("singleton", "")]);
        f.scaffold();
        let emulator = emulator(&f, &[]);

        let missing = emulator.run("__user", &args(&["alice"]), None).unwrap_err();
        assert!(matches!(missing, Error::Arguments(_)));
        let unknown = emulator
            .run("__user", &args(&["alice", "--uid", "1", "--shell", "sh"]), None)
            .unwrap_err();
        assert!(matches!(unknown, Error::Arguments(_)));
        let with_id = emulator.run("__motd", &args(&["x"]), None).unwrap_err();
        assert!(matches!(with_id, Error::Arguments(_)));

        let singleton = emulator.run("__motd", &[], None).unwrap();
        assert_eq!(singleton.name(), "__motd");
    }

    #[test]
    fn test_requirements() {
        let f = fixture();
        file_type(&f);
        f.write_type("__package", &[]);
        f.scaffold();

        let object = emulator(&f, &[(env::REQUIRE, " __package/vim  __file//etc/x/ ")])
            .run("__file", &args(&["etc/vimrc"]), None)
            .unwrap();
        assert_eq!(
            object.requirements().unwrap(),
            vec!["__package/vim", "__file/etc/x"]
        );

        let err = emulator(&f, &[(env::REQUIRE, "__nosuch/x")])
            .run("__file", &args(&["etc/y"]), None)
            .unwrap_err();
        assert!(matches!(err, Error::Store(store::Error::NoSuchType { .. })));
    }

    #[test]
    fn test_parent_records() {
        let f = fixture();
        file_type(&f);
        f.write_type("__app", &[]);
        f.scaffold();
        let parent = f.session.store().create_object("__app", "web").unwrap();

        emulator(&f, &[(env::OBJECT_NAME, "__app/web")])
            .run("__file", &args(&["etc/app.conf"]), None)
            .unwrap();
        emulator(&f, &[(env::OBJECT_NAME, "__app/web"), (env::REQUIRE, "__app/web")])
            .run("__file", &args(&["etc/app.env"]), None)
            .unwrap();

        assert_eq!(parent.autorequire().unwrap(), vec!["__file/etc/app.conf"]);
        assert_eq!(
            parent.typeorder().unwrap(),
            vec!["__file/etc/app.conf", "__file/etc/app.env"]
        );
    }

    #[test]
    fn test_concurrent_siblings_share_parent_files() {
        let f = fixture();
        file_type(&f);
        f.write_type("__app", &[]);
        f.scaffold();
        let parent = f.session.store().create_object("__app", "web").unwrap();

        let mut vars = f.session.manifest_env(Path::new(MANIFEST));
        vars.insert(env::OBJECT_NAME.to_string(), "__app/web".to_string());
        vars.insert(env::ORDER_DEPENDENCY.to_string(), "on".to_string());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let vars = vars.clone();
                scope.spawn(move || {
                    let emulator = Emulator::new(EmulatorEnv::from_vars(&vars).unwrap());
                    for n in 0..5 {
                        let id = format!("etc/w{worker}-{n}");
                        emulator.run("__file", &args(&[id.as_str()]), None).unwrap();
                    }
                });
            }
        });

        let order = parent.typeorder().unwrap();
        assert_eq!(order.len(), 20);
        let mut autorequire = parent.autorequire().unwrap();
        autorequire.sort();
        let mut expected = order.clone();
        expected.sort();
        assert_eq!(autorequire, expected);

        // Each sibling is ordered after exactly the one recorded before it.
        let chain = fsprop::read_lines(&parent.typeorder_dep_path()).unwrap();
        assert_eq!(chain.len(), 20);
        for pair in chain.windows(2) {
            let (type_name, object_id) = split_name(&pair[1]);
            let object = f.session.store().object(type_name, object_id).unwrap();
            assert_eq!(object.requirements().unwrap(), vec![pair[0].clone()]);
        }
    }

    #[test]
    fn test_order_dependency() {
        let f = fixture();
        file_type(&f);
        f.scaffold();
        let emulator = emulator(&f, &[(env::ORDER_DEPENDENCY, "on")]);

        let a = emulator.run("__file", &args(&["a"]), None).unwrap();
        let b = emulator.run("__file", &args(&["b"]), None).unwrap();
        let c = emulator.run("__file", &args(&["c"]), None).unwrap();

        assert!(a.requirements().unwrap().is_empty());
        assert_eq!(b.requirements().unwrap(), vec!["__file/a"]);
        assert_eq!(c.requirements().unwrap(), vec!["__file/b"]);
    }

    #[test]
    fn test_stdin() {
        let f = fixture();
        file_type(&f);
        f.scaffold();
        let emulator = emulator(&f, &[]);

        let mut input = Cursor::new(b"hello\n".to_vec());
        let object = emulator
            .run("__file", &args(&["etc/motd"]), Some(&mut input))
            .unwrap();
        assert_eq!(fs::read_to_string(object.stdin_path()).unwrap(), "hello\n");

        let mut empty = Cursor::new(Vec::new());
        let object = emulator
            .run("__file", &args(&["etc/issue"]), Some(&mut empty))
            .unwrap();
        assert!(!object.stdin_path().exists());
    }
}
