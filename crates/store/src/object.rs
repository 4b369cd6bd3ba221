//! Objects: concrete, addressable instances of a type
//!
//! An object named `__file/etc/motd` lives in
//! `<object base>/__file/etc/motd/<marker>/` where `<marker>` is the
//! per-run object marker. Inside that directory:
//!
//! ```text
//! parameter/<name>   one file per parameter, multi-valued ones one value per line
//! explorer/<name>    captured type explorer output
//! require            user-declared requirement patterns
//! autorequire        objects created by this object's manifest
//! source             manifests that declared the object
//! state              "", "prepared", "running" or "done"
//! code-local         generated local code
//! code-remote        generated remote code
//! changed            present iff generated code was non-empty
//! stdin              data piped into the emulator
//! stdout/, stderr/   captured script output
//! typeorder          objects created by this object's manifest, in order
//! typeorder_dep      order dependency scope while the manifest runs
//! ```

use crate::error::{Error, Result};
use crate::fsprop;
use crate::typedef::Type;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Lifecycle state of an object.
///
/// Objects move `Undef -> Prepared -> Done`; `Running` is understood when
/// read back but never written by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectState {
    #[default]
    Undef,
    Prepared,
    Running,
    Done,
}

impl ObjectState {
    /// Value persisted in the `state` file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undef => "",
            Self::Prepared => "prepared",
            Self::Running => "running",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undef => write!(f, "undef"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for ObjectState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(Self::Undef),
            "prepared" => Ok(Self::Prepared),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            other => Err(other.to_string()),
        }
    }
}

/// Value of one object parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Single-valued parameter.
    Single(String),
    /// Multi-valued parameter, in the order given.
    Multiple(Vec<String>),
    /// Boolean parameter that was set.
    Flag,
}

impl ParamValue {
    fn to_file_content(&self) -> String {
        match self {
            Self::Single(value) => format!("{value}\n"),
            Self::Multiple(values) => values.iter().map(|v| format!("{v}\n")).collect(),
            Self::Flag => String::new(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => write!(f, "{value}"),
            Self::Multiple(values) => write!(f, "{}", values.join(" ")),
            Self::Flag => write!(f, "(set)"),
        }
    }
}

/// Parameters of an object, keyed by parameter name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Join a type name and object id into an object name.
///
/// Singleton objects are named after their type alone.
pub fn join_name(type_name: &str, object_id: &str) -> String {
    if object_id.is_empty() {
        type_name.to_string()
    } else {
        format!("{type_name}/{object_id}")
    }
}

/// Split an object name into type name and object id.
pub fn split_name(name: &str) -> (&str, &str) {
    name.split_once('/').unwrap_or((name, ""))
}

/// Remove one leading and one trailing slash from a user supplied id.
///
/// `__file //etc/motd` and `__file /etc/motd/` address `__file/etc/motd`.
pub fn sanitise_object_id(object_id: &str) -> &str {
    let id = object_id.strip_prefix('/').unwrap_or(object_id);
    id.strip_suffix('/').unwrap_or(id)
}

/// Check an object id against the naming rules for a type.
pub fn validate_object_id(ty: &Type, object_id: &str, marker: &str) -> Result<()> {
    let illegal = |reason: String| Error::IllegalObjectId {
        object_id: object_id.to_string(),
        reason,
    };

    if ty.is_singleton() {
        if !object_id.is_empty() {
            return Err(illegal(format!(
                "singleton type {} does not take an object id",
                ty.name()
            )));
        }
        return Ok(());
    }

    if object_id.is_empty() {
        return Err(Error::MissingObjectId {
            type_name: ty.name().to_string(),
        });
    }
    if object_id == "." || object_id == "/" {
        return Err(illegal(format!("object id may not be '{object_id}'")));
    }
    if object_id.contains("//") {
        return Err(illegal("object id may not contain //".to_string()));
    }
    if object_id.split('/').any(|part| part == marker) {
        return Err(illegal(format!("object id may not contain '{marker}'")));
    }
    Ok(())
}

/// Handle to one object in the store.
///
/// The handle itself holds no mutable state: every accessor reads the
/// object's files, every mutator writes them.
#[derive(Debug, Clone)]
pub struct Object {
    ty: Arc<Type>,
    object_id: String,
    name: String,
    base_path: PathBuf,
    marker: String,
}

impl Object {
    /// Build a validated handle. Does not touch the filesystem.
    pub fn new(
        ty: Arc<Type>,
        object_id: &str,
        base_path: impl Into<PathBuf>,
        marker: impl Into<String>,
    ) -> Result<Self> {
        let marker = marker.into();
        validate_object_id(&ty, object_id, &marker)?;
        Ok(Self {
            name: join_name(ty.name(), object_id),
            object_id: object_id.to_string(),
            base_path: base_path.into(),
            marker,
            ty,
        })
    }

    /// `type/object_id`, or just the type for singletons.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Shared handle to the object's type.
    pub fn ty_arc(&self) -> &Arc<Type> {
        &self.ty
    }

    /// Object path relative to the object base: `name/marker`.
    pub fn object_path(&self) -> PathBuf {
        Path::new(&self.name).join(&self.marker)
    }

    /// Absolute object directory.
    pub fn absolute_path(&self) -> PathBuf {
        self.base_path.join(self.object_path())
    }

    /// Directory holding the marker directory.
    pub(crate) fn name_path(&self) -> PathBuf {
        self.base_path.join(&self.name)
    }

    pub fn parameter_path(&self) -> PathBuf {
        self.absolute_path().join("parameter")
    }

    pub fn explorer_path(&self) -> PathBuf {
        self.absolute_path().join("explorer")
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.absolute_path().join("stdout")
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.absolute_path().join("stderr")
    }

    pub fn code_local_path(&self) -> PathBuf {
        self.absolute_path().join("code-local")
    }

    pub fn code_remote_path(&self) -> PathBuf {
        self.absolute_path().join("code-remote")
    }

    pub fn stdin_path(&self) -> PathBuf {
        self.absolute_path().join("stdin")
    }

    pub fn typeorder_path(&self) -> PathBuf {
        self.absolute_path().join("typeorder")
    }

    pub fn typeorder_dep_path(&self) -> PathBuf {
        self.absolute_path().join("typeorder_dep")
    }

    /// Whether the object has been created in this run.
    pub fn exists(&self) -> bool {
        self.absolute_path().is_dir()
    }

    /// Create the object's directories.
    ///
    /// Fails if the object already exists, unless `allow_overwrite` is set.
    pub fn create(&self, allow_overwrite: bool) -> Result<()> {
        let path = self.absolute_path();
        if self.exists() && !allow_overwrite {
            return Err(Error::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "object already exists"),
            ));
        }

        for dir in [
            path.clone(),
            self.parameter_path(),
            self.explorer_path(),
            self.stdout_path(),
            self.stderr_path(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        log::trace!("Created object {} at {}", self.name, path.display());
        Ok(())
    }

    /// Parameters as recorded on disk, typed by the object's type.
    pub fn parameters(&self) -> Result<Parameters> {
        Ok(fsprop::read_dir_map(&self.parameter_path())?
            .into_iter()
            .map(|(key, content)| {
                let value = if self.ty.is_boolean(&key) {
                    ParamValue::Flag
                } else if self.ty.is_multiple(&key) {
                    ParamValue::Multiple(content.lines().map(str::to_string).collect())
                } else {
                    ParamValue::Single(fsprop::strip_newline(&content).to_string())
                };
                (key, value)
            })
            .collect())
    }

    /// Replace all parameters.
    pub fn set_parameters(&self, parameters: &Parameters) -> Result<()> {
        let dir = self.parameter_path();
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        for (key, value) in parameters {
            fsprop::write_string(&dir.join(key), &value.to_file_content())?;
        }
        Ok(())
    }

    pub fn requirements(&self) -> Result<Vec<String>> {
        fsprop::read_lines(&self.absolute_path().join("require"))
    }

    /// Record a requirement unless already present.
    pub fn add_requirement(&self, requirement: &str) -> Result<()> {
        fsprop::append_unique(&self.absolute_path().join("require"), requirement).map(|_| ())
    }

    pub fn autorequire(&self) -> Result<Vec<String>> {
        fsprop::read_lines(&self.absolute_path().join("autorequire"))
    }

    /// Record an auto-requirement unless already present.
    pub fn add_autorequire(&self, name: &str) -> Result<()> {
        fsprop::append_unique(&self.absolute_path().join("autorequire"), name).map(|_| ())
    }

    pub fn source(&self) -> Result<Vec<String>> {
        fsprop::read_lines(&self.absolute_path().join("source"))
    }

    pub fn append_source(&self, manifest: &str) -> Result<()> {
        fsprop::append_line(&self.absolute_path().join("source"), manifest)
    }

    pub fn state(&self) -> Result<ObjectState> {
        let path = self.absolute_path().join("state");
        let raw = fsprop::read_string(&path)?.unwrap_or_default();
        raw.parse()
            .map_err(|value| Error::InvalidState { path, value })
    }

    pub fn set_state(&self, state: ObjectState) -> Result<()> {
        log::trace!("{}: state -> {}", self.name, state);
        fsprop::write_string(&self.absolute_path().join("state"), state.as_str())
    }

    /// Captured type explorer output keyed by explorer name.
    pub fn explorers(&self) -> Result<BTreeMap<String, String>> {
        fsprop::read_dir_map(&self.explorer_path())
    }

    pub fn set_explorer(&self, name: &str, output: &str) -> Result<()> {
        let dir = self.explorer_path();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        fsprop::write_string(&dir.join(name), output)
    }

    pub fn code_local(&self) -> Result<String> {
        Ok(fsprop::read_string(&self.code_local_path())?.unwrap_or_default())
    }

    pub fn set_code_local(&self, code: &str) -> Result<()> {
        fsprop::write_string(&self.code_local_path(), code)
    }

    pub fn code_remote(&self) -> Result<String> {
        Ok(fsprop::read_string(&self.code_remote_path())?.unwrap_or_default())
    }

    pub fn set_code_remote(&self, code: &str) -> Result<()> {
        fsprop::write_string(&self.code_remote_path(), code)
    }

    /// Whether any generated code was non-empty.
    pub fn changed(&self) -> bool {
        fsprop::read_flag(&self.absolute_path().join("changed"))
    }

    pub fn set_changed(&self, changed: bool) -> Result<()> {
        fsprop::write_flag(&self.absolute_path().join("changed"), changed)
    }

    /// Objects created by this object's manifest, in creation order.
    pub fn typeorder(&self) -> Result<Vec<String>> {
        fsprop::read_lines(&self.typeorder_path())
    }

    pub fn append_typeorder(&self, name: &str) -> Result<()> {
        fsprop::append_line(&self.typeorder_path(), name)
    }

    /// Remove per-preparation scratch files.
    pub fn cleanup(&self) -> Result<()> {
        fsprop::remove_file(&self.typeorder_dep_path())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.base_path == other.base_path
    }
}

impl Eq for Object {}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typedef::tests::write_type;
    use tempfile::TempDir;

    const MARKER: &str = ".cdist-test";

    fn load(tmp: &TempDir, name: &str, files: &[(&str, &str)]) -> Arc<Type> {
        let types = tmp.path().join("type");
        write_type(&types, name, files);
        Arc::new(Type::load(&types, name).unwrap())
    }

    #[test]
    fn test_name_roundtrip() {
        for name in ["__file/etc/motd", "__user/root", "__timezone", "__a/b/c/d"] {
            let (type_name, object_id) = split_name(name);
            assert_eq!(join_name(type_name, object_id), name);
        }
        assert_eq!(split_name("__file/etc/motd"), ("__file", "etc/motd"));
        assert_eq!(split_name("__timezone"), ("__timezone", ""));
    }

    #[test]
    fn test_sanitise_strips_one_slash() {
        assert_eq!(sanitise_object_id("/etc/motd"), "etc/motd");
        assert_eq!(sanitise_object_id("etc/motd/"), "etc/motd");
        assert_eq!(sanitise_object_id("//etc"), "/etc");
        assert_eq!(sanitise_object_id("plain"), "plain");
    }

    #[test]
    fn test_validate_object_id() {
        let tmp = TempDir::new().unwrap();
        let file = load(&tmp, "__file", &[]);
        let singleton = load(&tmp, "__timezone", &[("singleton", "")]);

        assert!(validate_object_id(&file, "etc/motd", MARKER).is_ok());
        assert!(matches!(
            validate_object_id(&file, "", MARKER),
            Err(Error::MissingObjectId { .. })
        ));
        for bad in [".", "/", "etc//motd", "etc/.cdist-test/x", ".cdist-test"] {
            assert!(
                matches!(
                    validate_object_id(&file, bad, MARKER),
                    Err(Error::IllegalObjectId { .. })
                ),
                "{bad} should be rejected"
            );
        }

        assert!(validate_object_id(&singleton, "", MARKER).is_ok());
        assert!(matches!(
            validate_object_id(&singleton, "x", MARKER),
            Err(Error::IllegalObjectId { .. })
        ));
    }

    #[test]
    fn test_create_and_fields() {
        let tmp = TempDir::new().unwrap();
        let ty = load(
            &tmp,
            "__file",
            &[
                ("parameter/optional", "mode\n"),
                ("parameter/optional_multiple", "line\n"),
                ("parameter/boolean", "force\n"),
            ],
        );
        let obj = Object::new(ty, "etc/motd", tmp.path().join("object"), MARKER).unwrap();

        assert!(!obj.exists());
        obj.create(false).unwrap();
        assert!(obj.exists());
        assert!(obj.create(false).is_err());
        obj.create(true).unwrap();

        assert_eq!(obj.name(), "__file/etc/motd");
        assert_eq!(obj.state().unwrap(), ObjectState::Undef);

        let mut params = Parameters::new();
        params.insert("mode".into(), ParamValue::Single("0644".into()));
        params.insert(
            "line".into(),
            ParamValue::Multiple(vec!["b".into(), "a".into()]),
        );
        params.insert("force".into(), ParamValue::Flag);
        obj.set_parameters(&params).unwrap();
        assert_eq!(obj.parameters().unwrap(), params);

        obj.add_requirement("__package/vim").unwrap();
        obj.add_requirement("__package/vim").unwrap();
        assert_eq!(obj.requirements().unwrap(), vec!["__package/vim"]);

        obj.set_state(ObjectState::Prepared).unwrap();
        assert_eq!(obj.state().unwrap(), ObjectState::Prepared);
        obj.set_state(ObjectState::Done).unwrap();
        assert_eq!(obj.state().unwrap(), ObjectState::Done);

        obj.set_explorer("stat", "regular file\n").unwrap();
        assert_eq!(obj.explorers().unwrap().get("stat").unwrap(), "regular file\n");

        assert!(!obj.changed());
        obj.set_code_remote("touch /etc/motd\n").unwrap();
        obj.set_changed(true).unwrap();
        assert!(obj.changed());
        assert_eq!(obj.code_remote().unwrap(), "touch /etc/motd\n");
        assert_eq!(obj.code_local().unwrap(), "");
    }

    #[test]
    fn test_set_parameters_replaces_previous() {
        let tmp = TempDir::new().unwrap();
        let ty = load(&tmp, "__file", &[("parameter/optional", "mode\nowner\n")]);
        let obj = Object::new(ty, "x", tmp.path().join("object"), MARKER).unwrap();
        obj.create(false).unwrap();

        let mut first = Parameters::new();
        first.insert("owner".into(), ParamValue::Single("root".into()));
        obj.set_parameters(&first).unwrap();

        let mut second = Parameters::new();
        second.insert("mode".into(), ParamValue::Single("0600".into()));
        obj.set_parameters(&second).unwrap();

        assert_eq!(obj.parameters().unwrap(), second);
    }

    #[test]
    fn test_invalid_state_file() {
        let tmp = TempDir::new().unwrap();
        let ty = load(&tmp, "__file", &[]);
        let obj = Object::new(ty, "x", tmp.path().join("object"), MARKER).unwrap();
        obj.create(false).unwrap();
        fs::write(obj.absolute_path().join("state"), "exploded").unwrap();

        assert!(matches!(obj.state(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn test_state_parse() {
        assert_eq!("done\n".parse::<ObjectState>().unwrap(), ObjectState::Done);
        assert_eq!("".parse::<ObjectState>().unwrap(), ObjectState::Undef);
        assert_eq!(ObjectState::Undef.to_string(), "undef");
    }
}
