// for an item models/x/y/z.mdl
pub trait VPath {
    // return mdl
    fn ext(&self) -> &str;
    // return z
    fn filename(&self) -> &str;
    // return models/x/y
    fn dir(&self) -> String;

    /// `models/x/y/z.<ext>`
    fn with_extension(&self, ext: &str) -> String {
        join(&self.dir(), &format!("{}.{}", self.filename(), ext))
    }

    /// `models/x/y/z.<suffix>.<ext>`, as used by the strip files (`z.dx90.vtx`)
    fn with_suffix_extension(&self, suffix: &str, ext: &str) -> String {
        join(
            &self.dir(),
            &format!("{}.{}.{}", self.filename(), suffix, ext),
        )
    }
}

fn join(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_owned()
    } else {
        format!("{}/{}", dir, file)
    }
}

pub struct VGlobalPath<'a> {
    path: &'a str,
}

impl<'a> VGlobalPath<'a> {
    pub fn new(path: &'a str) -> Self {
        Self { path }
    }

    fn file_part(&self) -> &'a str {
        match self.path.rfind(['/', '\\']) {
            Some(last_sep) => &self.path[last_sep + 1..],
            None => self.path,
        }
    }
}

impl<'a> From<&'a str> for VGlobalPath<'a> {
    fn from(value: &'a str) -> Self {
        VGlobalPath { path: value }
    }
}

impl<'a> VPath for VGlobalPath<'a> {
    fn ext(&self) -> &str {
        let file = self.file_part();
        match file.rfind('.') {
            Some(ext_sep) => &file[ext_sep + 1..],
            None => "",
        }
    }

    fn filename(&self) -> &str {
        let file = self.file_part();
        match file.rfind('.') {
            Some(ext_sep) => &file[..ext_sep],
            None => file,
        }
    }

    fn dir(&self) -> String {
        match self.path.rfind(['/', '\\']) {
            Some(last_sep) => self.path[..last_sep].replace('\\', "/"),
            None => String::new(),
        }
    }
}

pub struct VSplitPath<'a> {
    directory: &'a str,
    filename: &'a str,
    ext: &'a str,
}

impl<'a> VSplitPath<'a> {
    pub fn new(directory: &'a str, filename: &'a str, ext: &'a str) -> Self {
        Self {
            directory,
            filename,
            ext,
        }
    }
}

impl<'a> VPath for VSplitPath<'a> {
    fn ext(&self) -> &str {
        self.ext
    }

    fn filename(&self) -> &str {
        self.filename
    }

    fn dir(&self) -> String {
        self.directory.trim_end_matches('/').to_owned()
    }
}

#[cfg(test)]
mod vpath_tests {
    use super::*;

    #[test]
    fn test_global_path_parts() {
        let p = VGlobalPath::from("models/props_c17/bench01a.mdl");
        assert_eq!(p.ext(), "mdl");
        assert_eq!(p.filename(), "bench01a");
        assert_eq!(p.dir(), "models/props_c17");
    }

    #[test]
    fn test_companion_paths() {
        let p = VGlobalPath::from("models/props_c17/bench01a.mdl");
        assert_eq!(p.with_extension("vvd"), "models/props_c17/bench01a.vvd");
        assert_eq!(
            p.with_suffix_extension("dx90", "vtx"),
            "models/props_c17/bench01a.dx90.vtx"
        );

        let bare = VGlobalPath::from("crate.mdl");
        assert_eq!(bare.with_extension("vvd"), "crate.vvd");
    }

    #[test]
    fn test_dots_in_directories() {
        let p = VGlobalPath::from("models/v1.2/gun");
        assert_eq!(p.ext(), "");
        assert_eq!(p.filename(), "gun");
        assert_eq!(p.dir(), "models/v1.2");
    }

    #[test]
    fn test_split_path() {
        let p = VSplitPath::new("materials/models/", "crate", "vmt");
        assert_eq!(p.with_extension("vtf"), "materials/models/crate.vtf");
    }
}
