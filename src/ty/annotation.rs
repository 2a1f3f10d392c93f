//! Annotation text → `Ty`.
//!
//! Accepts the Python `typing` spelling that experiment configs are usually
//! documented in: `Optional[List[int]]`, `Dict[str, float]`,
//! `Union[int, str]`, `int | None`, `Tuple[int, int]`, lowercase generics and
//! a `typing.` prefix. Bare names resolve against a [`Namespace`]; a
//! registry can also be spelled `RegistryConfig[Name]`.
use super::{simplify_union, Ty};
use crate::error::{Error, Result};
use crate::registry::Namespace;

pub fn parse(annotation: &str, ns: &Namespace) -> Result<Ty> {
    let mut parser = Parser { src: annotation, pos: 0, ns };
    let ty = parser.union_expr()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(parser.fail(format!("unexpected `{}`", &parser.src[parser.pos..])));
    }
    ty.ok_or_else(|| Error::unsupported(annotation, "a bare `None` is not a field type"))
}

// `None` parses to `Option::None` so that unions can lift it into `Optional`.
type Parsed = Option<Ty>;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    ns: &'a Namespace,
}

impl<'a> Parser<'a> {
    fn fail(&self, reason: impl Into<String>) -> Error {
        Error::unsupported(self.src, reason)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.src[self.pos..].chars().next() {
            if !c.is_whitespace() { break; }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) { Ok(()) } else { Err(self.fail(format!("expected `{c}` at offset {}", self.pos))) }
    }

    fn ident(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.fail(format!("expected a type name at offset {}", self.pos)));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// `atom ('|' atom)*`
    fn union_expr(&mut self) -> Result<Parsed> {
        let first = self.atom()?;
        if !self.peek('|') {
            return Ok(first);
        }
        let mut had_null = first.is_none();
        let mut arms: Vec<Ty> = first.into_iter().collect();
        while self.eat('|') {
            match self.atom()? {
                Some(ty) => arms.push(ty),
                None => had_null = true,
            }
        }
        Ok(simplify_union(arms, had_null))
    }

    fn peek(&mut self, c: char) -> bool {
        self.skip_ws();
        self.src[self.pos..].starts_with(c)
    }

    fn args(&mut self) -> Result<Vec<Parsed>> {
        let mut out = vec![self.union_expr()?];
        while self.eat(',') {
            out.push(self.union_expr()?);
        }
        self.expect(']')?;
        Ok(out)
    }

    fn atom(&mut self) -> Result<Parsed> {
        let raw = self.ident()?;
        let name = raw.strip_prefix("typing.").unwrap_or(raw);

        if self.eat('[') {
            let args = self.args()?;
            return self.generic(name, args).map(Some);
        }

        Ok(Some(match name {
            "None" | "NoneType" => return Ok(None),
            "int" => Ty::INT,
            "float" => Ty::FLOAT,
            "str" => Ty::STR,
            "bool" => Ty::BOOL,
            "Path" | "pathlib.Path" | "PathLike" | "os.PathLike" => Ty::PATH,
            "Any" => Ty::Any,
            "List" | "list" => return Err(self.fail("use `List[Any]` instead of a bare list")),
            "Dict" | "dict" => return Err(self.fail("use `Dict[K, V]` instead of a bare dict")),
            "Tuple" | "tuple" => return Err(self.fail("use `Tuple[...]` instead of a bare tuple")),
            "Optional" | "Union" | "RegistryConfig" => {
                return Err(self.fail(format!("`{name}` needs type arguments")))
            }
            other => {
                if let Some(schema) = self.ns.schema(other) {
                    Ty::nested(schema)
                } else if let Some(e) = self.ns.enumeration(other) {
                    Ty::enumeration(e)
                } else if let Some(registry) = self.ns.registry(other) {
                    Ty::registry(registry)
                } else {
                    return Err(self.fail(format!("`{other}` is not a declared schema, enum or registry")));
                }
            }
        }))
    }

    fn generic(&self, name: &str, args: Vec<Parsed>) -> Result<Ty> {
        let arity = |n: usize| -> Result<()> {
            if args.len() == n { Ok(()) } else {
                Err(self.fail(format!("`{name}` takes {n} type argument(s), found {}", args.len())))
            }
        };
        let some = |arg: Parsed| -> Result<Ty> {
            arg.ok_or_else(|| self.fail(format!("`None` is not allowed as an argument of `{name}`")))
        };

        match name {
            "Optional" => {
                arity(1)?;
                Ok(match args.into_iter().next().flatten() {
                    Some(inner) => Ty::optional(inner),
                    None => return Err(self.fail("`Optional[None]` has no values")),
                })
            }
            "Union" => {
                let mut had_null = false;
                let mut arms = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Some(ty) => arms.push(ty),
                        None => had_null = true,
                    }
                }
                simplify_union(arms, had_null).ok_or_else(|| self.fail("a union of only `None` has no values"))
            }
            "List" | "list" => {
                arity(1)?;
                let inner = some(args.into_iter().next().flatten())?;
                Ok(Ty::list(inner))
            }
            "Dict" | "dict" => {
                arity(2)?;
                let mut it = args.into_iter();
                let key = some(it.next().flatten())?;
                let value = some(it.next().flatten())?;
                if !key.is_hashable() {
                    return Err(self.fail(format!("`{key}` cannot be a dict key")));
                }
                Ok(Ty::dict(key, value))
            }
            "Tuple" | "tuple" => {
                let items = args.into_iter().map(some).collect::<Result<Vec<_>>>()?;
                Ok(Ty::tuple(items))
            }
            "RegistryConfig" => {
                arity(1)?;
                match some(args.into_iter().next().flatten())? {
                    registry @ Ty::Registry(_) => Ok(registry),
                    other => Err(self.fail(format!("`{other}` is not a registry"))),
                }
            }
            other => Err(self.fail(format!("unknown generic `{other}`"))),
        }
    }
}
