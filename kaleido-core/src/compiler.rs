use crate::ast::Construct;
use crate::config::FrontendConfig;
use crate::error::CoreError;
use crate::ir::{FunctionId, Module};
use crate::lexer::Lexer;
use crate::lower::LoweringSession;
use crate::parser::Parser;

/// Outcome of handling one top-level construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Definition(FunctionId),
    Extern(FunctionId),
    TopLevelExpr(FunctionId),
    Separator,
    Error(CoreError),
}

/// Pulls constructs from the parser one at a time and lowers each as soon
/// as it is parsed. Errors never end the session: a parse error discards
/// one token and parsing resumes from there.
pub struct Driver<I: Iterator<Item = char>> {
    parser: Parser<I>,
    session: LoweringSession,
}

impl<I: Iterator<Item = char>> Driver<I> {
    pub fn new(chars: I, config: &FrontendConfig) -> Self {
        let lexer = Lexer::new(chars).with_strict_numbers(config.strict_numbers);
        Driver {
            parser: Parser::new(lexer, config.precedence.clone()),
            session: LoweringSession::new(config.module_name.clone()),
        }
    }

    /// Handle the next construct, or `None` once the input is exhausted.
    pub fn step(&mut self) -> Option<Event> {
        let construct = match self.parser.parse_next_construct() {
            Ok(Construct::EndOfInput) => return None,
            Ok(construct) => construct,
            Err(err) => {
                self.parser.skip_token();
                return Some(Event::Error(err.into()));
            }
        };

        let event = match self.session.lower(&construct) {
            Ok(Some(id)) => match construct {
                Construct::Definition(_) => Event::Definition(id),
                Construct::Extern(_) => Event::Extern(id),
                _ => Event::TopLevelExpr(id),
            },
            Ok(None) => Event::Separator,
            Err(err) => Event::Error(err.into()),
        };
        Some(event)
    }

    pub fn module(&self) -> &Module {
        self.session.module()
    }

    pub fn into_module(self) -> Module {
        self.session.into_module()
    }
}

impl<I: Iterator<Item = char>> Iterator for Driver<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.step()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationArtifact {
    pub module: Module,
    pub errors: Vec<CoreError>,
}

/// Compile a whole source string, collecting every error instead of
/// stopping at the first one.
pub fn compile(source: &str, config: &FrontendConfig) -> CompilationArtifact {
    let mut driver = Driver::new(source.chars(), config);
    let mut errors = Vec::new();
    while let Some(event) = driver.step() {
        if let Event::Error(err) = event {
            errors.push(err);
        }
    }
    CompilationArtifact {
        module: driver.into_module(),
        errors,
    }
}

/// Compile `source` and print the resulting module, failing on the first
/// error encountered.
pub fn emit_llvm_ir(source: &str, config: &FrontendConfig) -> Result<String, CoreError> {
    let artifact = compile(source, config);
    match artifact.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(artifact.module.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LexError, LowerError, ParseError};

    #[test]
    fn compiles_program_to_module() {
        let ir = emit_llvm_ir(
            "# squares\nextern sin(x);\ndef sq(x) x * x;\nsq(sin(2));\n",
            &FrontendConfig::default(),
        )
        .expect("compile");
        assert_eq!(
            ir,
            "; ModuleID = 'kaleido'\n\
             source_filename = \"kaleido\"\n\
             \n\
             declare double @sin(double)\n\
             \n\
             define double @sq(double %x) {\n\
             entry:\n  \
               %multmp = fmul double %x, %x\n  \
               ret double %multmp\n\
             }\n\
             \n\
             define double @0() {\n\
             entry:\n  \
               %calltmp = call double @sin(double 2.000000e+00)\n  \
               %calltmp1 = call double @sq(double %calltmp)\n  \
               ret double %calltmp1\n\
             }\n"
        );
    }

    #[test]
    fn reports_events_in_order() {
        let config = FrontendConfig::default();
        let events: Vec<_> =
            Driver::new("extern f(a); def g(b) f(b); g(1)".chars(), &config).collect();
        assert!(
            matches!(
                events.as_slice(),
                [
                    Event::Extern(_),
                    Event::Separator,
                    Event::Definition(_),
                    Event::Separator,
                    Event::TopLevelExpr(_),
                ]
            ),
            "{events:?}"
        );
    }

    #[test]
    fn recovers_from_parse_errors() {
        let artifact = compile("def (x) 1; def f(x) x; f(2)", &FrontendConfig::default());
        assert!(!artifact.errors.is_empty());
        assert!(matches!(
            artifact.errors[0],
            CoreError::Parse(ParseError::ExpectedFunctionName)
        ));
        assert!(artifact.module.get_function("f").is_some());
    }

    #[test]
    fn lowering_errors_do_not_stop_the_session() {
        let artifact = compile(
            "def f(x) x; def f(x) x; g(1); f(1, 2); f(3)",
            &FrontendConfig::default(),
        );
        assert_eq!(
            artifact.errors,
            vec![
                CoreError::Lower(LowerError::Redefinition("f".into())),
                CoreError::Lower(LowerError::UnknownFunction("g".into())),
                CoreError::Lower(LowerError::ArityMismatch {
                    callee: "f".into(),
                    expected: 1,
                    found: 2
                }),
            ]
        );
        assert_eq!(artifact.module.functions().count(), 2);
    }

    #[test]
    fn strict_numbers_are_configurable() {
        let permissive = compile("1.2.3", &FrontendConfig::default());
        assert!(permissive.errors.is_empty());

        let config = FrontendConfig {
            strict_numbers: true,
            ..FrontendConfig::default()
        };
        let strict = compile("1.2.3", &config);
        assert_eq!(
            strict.errors,
            vec![CoreError::Parse(ParseError::Lex(LexError::MalformedNumber {
                text: "1.2.3".into()
            }))]
        );
    }

    #[test]
    fn module_name_comes_from_config() {
        let config = FrontendConfig {
            module_name: "my cool jit".into(),
            ..FrontendConfig::default()
        };
        let ir = emit_llvm_ir("", &config).expect("compile");
        assert!(ir.starts_with("; ModuleID = 'my cool jit'\n"));
    }

    #[test]
    fn emit_fails_on_first_error() {
        let err = emit_llvm_ir("x; y", &FrontendConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CoreError::Lower(LowerError::UnknownVariable("x".into()))
        );
    }

    #[test]
    fn deep_nesting_is_reported_and_the_session_continues() {
        let source = format!("{}1{}; def f(x) x + x + x", "(".repeat(5000), ")".repeat(5000));
        let artifact = compile(&source, &FrontendConfig::default());
        assert_eq!(
            artifact.errors[0],
            CoreError::Parse(ParseError::NestingTooDeep(crate::parser::MAX_NESTING_DEPTH))
        );
        let f = artifact.module.get_function("f").expect("f survives");
        assert_eq!(artifact.module.verify_function(f), Ok(()));
    }
}
