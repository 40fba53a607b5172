//! The environment model: the builtins, interesting constants, and
//! stdlib group/method signatures the builder draws on when it has no
//! better source of values (`buildPrefix`, `LoadBuiltin`, and
//! `CallMethod`'s result type all consult this).

use ahash::AHashMap as HashMap;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::types::{LuaType, Parameter, Signature};

fn sig(parameters: Vec<Parameter>, returns: Vec<LuaType>) -> Rc<Signature> {
    Rc::new(Signature::new(parameters, returns).expect("builtin signatures are well-formed by construction"))
}

fn module(name: &str, methods: Vec<(&str, Rc<Signature>)>) -> LuaType {
    let mut ty = LuaType::object(Some(SmolStr::new(name)));
    for (method, signature) in methods {
        ty = ty.adding_method(method, (*signature).clone());
    }
    ty
}

/// A fixed catalogue of Lua builtins plus interesting literal values,
/// built once per fuzzer instance and shared (read-only) by the
/// builder, the splicer's remap step, and the type analyzer's
/// `LoadBuiltin`/`CallMethod` handling.
pub struct Environment {
    builtins: HashMap<SmolStr, LuaType>,
    interesting_integers: Vec<i64>,
    interesting_floats: Vec<f64>,
    interesting_strings: Vec<SmolStr>,
}

impl Environment {
    pub fn lua_stdlib() -> Self {
        let mut builtins = HashMap::new();

        builtins.insert(
            SmolStr::new("print"),
            LuaType::function(Signature::new(vec![Parameter::Rest(LuaType::anything())], vec![]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("type"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::string()]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("tostring"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::string()]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("tonumber"),
            LuaType::function(
                Signature::new(
                    vec![Parameter::Plain(LuaType::anything()), Parameter::Optional(LuaType::integer())],
                    vec![LuaType::number()],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("pairs"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::anything()]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("ipairs"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::anything()]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("pcall"),
            LuaType::function(
                Signature::new(
                    vec![Parameter::Plain(LuaType::anything()), Parameter::Rest(LuaType::anything())],
                    vec![LuaType::boolean(), LuaType::anything()],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("error"),
            LuaType::function(
                Signature::new(
                    vec![Parameter::Plain(LuaType::anything()), Parameter::Optional(LuaType::integer())],
                    vec![],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("assert"),
            LuaType::function(
                Signature::new(
                    vec![Parameter::Plain(LuaType::anything()), Parameter::Optional(LuaType::string())],
                    vec![LuaType::anything()],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("select"),
            LuaType::function(
                Signature::new(vec![Parameter::Plain(LuaType::anything()), Parameter::Rest(LuaType::anything())], vec![LuaType::anything()])
                    .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("setmetatable"),
            LuaType::function(
                Signature::new(
                    vec![Parameter::Plain(LuaType::object(None)), Parameter::Plain(LuaType::object(None))],
                    vec![LuaType::object(None)],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("getmetatable"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::anything()]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("rawget"),
            LuaType::function(
                Signature::new(vec![Parameter::Plain(LuaType::object(None)), Parameter::Plain(LuaType::anything())], vec![LuaType::anything()])
                    .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("rawset"),
            LuaType::function(
                Signature::new(
                    vec![
                        Parameter::Plain(LuaType::object(None)),
                        Parameter::Plain(LuaType::anything()),
                        Parameter::Plain(LuaType::anything()),
                    ],
                    vec![LuaType::object(None)],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("rawequal"),
            LuaType::function(
                Signature::new(vec![Parameter::Plain(LuaType::anything()), Parameter::Plain(LuaType::anything())], vec![LuaType::boolean()])
                    .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("rawlen"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::integer()]).unwrap()),
        );
        builtins.insert(
            SmolStr::new("next"),
            LuaType::function(
                Signature::new(
                    vec![Parameter::Plain(LuaType::object(None)), Parameter::Optional(LuaType::anything())],
                    vec![LuaType::anything(), LuaType::anything()],
                )
                .unwrap(),
            ),
        );
        builtins.insert(
            SmolStr::new("unpack"),
            LuaType::function(Signature::new(vec![Parameter::Plain(LuaType::object(None))], vec![LuaType::anything()]).unwrap()),
        );

        builtins.insert(
            SmolStr::new("math"),
            module(
                "math",
                vec![
                    ("abs", sig(vec![Parameter::Plain(LuaType::number())], vec![LuaType::number()])),
                    ("ceil", sig(vec![Parameter::Plain(LuaType::number())], vec![LuaType::integer()])),
                    ("floor", sig(vec![Parameter::Plain(LuaType::number())], vec![LuaType::integer()])),
                    (
                        "max",
                        sig(vec![Parameter::Plain(LuaType::number()), Parameter::Rest(LuaType::number())], vec![LuaType::number()]),
                    ),
                    (
                        "min",
                        sig(vec![Parameter::Plain(LuaType::number()), Parameter::Rest(LuaType::number())], vec![LuaType::number()]),
                    ),
                    ("sqrt", sig(vec![Parameter::Plain(LuaType::number())], vec![LuaType::float()])),
                    ("sin", sig(vec![Parameter::Plain(LuaType::number())], vec![LuaType::float()])),
                    ("cos", sig(vec![Parameter::Plain(LuaType::number())], vec![LuaType::float()])),
                    (
                        "random",
                        sig(
                            vec![Parameter::Optional(LuaType::integer()), Parameter::Optional(LuaType::integer())],
                            vec![LuaType::number()],
                        ),
                    ),
                    ("type", sig(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::string()])),
                    (
                        "tointeger",
                        sig(vec![Parameter::Plain(LuaType::anything())], vec![LuaType::integer()]),
                    ),
                    (
                        "fmod",
                        sig(vec![Parameter::Plain(LuaType::number()), Parameter::Plain(LuaType::number())], vec![LuaType::number()]),
                    ),
                ],
            ),
        );

        builtins.insert(
            SmolStr::new("string"),
            module(
                "string",
                vec![
                    (
                        "format",
                        sig(vec![Parameter::Plain(LuaType::string()), Parameter::Rest(LuaType::anything())], vec![LuaType::string()]),
                    ),
                    (
                        "sub",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::string()),
                                Parameter::Plain(LuaType::integer()),
                                Parameter::Optional(LuaType::integer()),
                            ],
                            vec![LuaType::string()],
                        ),
                    ),
                    ("len", sig(vec![Parameter::Plain(LuaType::string())], vec![LuaType::integer()])),
                    (
                        "rep",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::string()),
                                Parameter::Plain(LuaType::integer()),
                                Parameter::Optional(LuaType::string()),
                            ],
                            vec![LuaType::string()],
                        ),
                    ),
                    ("upper", sig(vec![Parameter::Plain(LuaType::string())], vec![LuaType::string()])),
                    ("lower", sig(vec![Parameter::Plain(LuaType::string())], vec![LuaType::string()])),
                    (
                        "byte",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::string()),
                                Parameter::Optional(LuaType::integer()),
                                Parameter::Optional(LuaType::integer()),
                            ],
                            vec![LuaType::integer()],
                        ),
                    ),
                    ("char", sig(vec![Parameter::Rest(LuaType::integer())], vec![LuaType::string()])),
                    (
                        "find",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::string()),
                                Parameter::Plain(LuaType::string()),
                                Parameter::Optional(LuaType::integer()),
                            ],
                            vec![LuaType::integer(), LuaType::integer()],
                        ),
                    ),
                    (
                        "gsub",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::string()),
                                Parameter::Plain(LuaType::string()),
                                Parameter::Plain(LuaType::string()),
                                Parameter::Optional(LuaType::integer()),
                            ],
                            vec![LuaType::string(), LuaType::integer()],
                        ),
                    ),
                ],
            ),
        );

        builtins.insert(
            SmolStr::new("table"),
            module(
                "table",
                vec![
                    (
                        "insert",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::object(None)),
                                Parameter::Plain(LuaType::anything()),
                                Parameter::Optional(LuaType::anything()),
                            ],
                            vec![],
                        ),
                    ),
                    (
                        "remove",
                        sig(
                            vec![Parameter::Plain(LuaType::object(None)), Parameter::Optional(LuaType::integer())],
                            vec![LuaType::anything()],
                        ),
                    ),
                    (
                        "concat",
                        sig(
                            vec![
                                Parameter::Plain(LuaType::object(None)),
                                Parameter::Optional(LuaType::string()),
                                Parameter::Optional(LuaType::integer()),
                                Parameter::Optional(LuaType::integer()),
                            ],
                            vec![LuaType::string()],
                        ),
                    ),
                    (
                        "sort",
                        sig(
                            vec![Parameter::Plain(LuaType::object(None)), Parameter::Optional(LuaType::function(
                                Signature::new(
                                    vec![Parameter::Plain(LuaType::anything()), Parameter::Plain(LuaType::anything())],
                                    vec![LuaType::boolean()],
                                )
                                .unwrap(),
                            ))],
                            vec![],
                        ),
                    ),
                    (
                        "unpack",
                        sig(vec![Parameter::Plain(LuaType::object(None))], vec![LuaType::anything()]),
                    ),
                ],
            ),
        );

        builtins.insert(
            SmolStr::new("os"),
            module(
                "os",
                vec![
                    ("time", sig(vec![], vec![LuaType::integer()])),
                    ("clock", sig(vec![], vec![LuaType::float()])),
                    ("date", sig(vec![Parameter::Optional(LuaType::string())], vec![LuaType::string()])),
                ],
            ),
        );

        builtins.insert(
            SmolStr::new("io"),
            module(
                "io",
                vec![
                    ("write", sig(vec![Parameter::Rest(LuaType::anything())], vec![])),
                    ("read", sig(vec![Parameter::Optional(LuaType::string())], vec![LuaType::string()])),
                ],
            ),
        );

        Environment {
            builtins,
            interesting_integers: vec![
                0, 1, -1, 2, 10, 0x7fff_ffff, -0x8000_0000, i64::MAX, i64::MIN, 1 << 31, 1 << 53,
            ],
            interesting_floats: vec![0.0, -0.0, 1.0, -1.0, 0.5, f64::MIN_POSITIVE, f64::MAX, f64::INFINITY, f64::NEG_INFINITY],
            interesting_strings: vec!["", "a", "%s", "%d", "\0", "true", "false", "nil"]
                .into_iter()
                .map(SmolStr::new)
                .collect(),
        }
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &str> {
        self.builtins.keys().map(SmolStr::as_str)
    }

    pub fn builtin_type(&self, name: &str) -> Option<LuaType> {
        self.builtins.get(name).cloned()
    }

    pub fn interesting_integers(&self) -> &[i64] {
        &self.interesting_integers
    }

    pub fn interesting_floats(&self) -> &[f64] {
        &self.interesting_floats
    }

    pub fn interesting_strings(&self) -> &[SmolStr] {
        &self.interesting_strings
    }
}
