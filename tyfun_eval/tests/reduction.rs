//! End-to-end tests running whole scripts through the driver.

extern crate env_logger;
extern crate tyfun_env;
extern crate tyfun_diag;
extern crate tyfun_syntax;
extern crate tyfun_types;
extern crate tyfun_eval;

use std::time::Duration;

use tyfun_env::{Source, SourceFile, WithLoc};
use tyfun_diag::{CollectedReport, Locale, Report, Kind};
use tyfun_syntax::{Name, parse_chunk};
use tyfun_types::ty::{Key, HostTy, HostTable, HostProp, HostSeq, HostFunc};
use tyfun_types::env::{ClassDef, ClassRegistry};
use tyfun_eval::{Session, Governor, run_script};

fn run_with_limit(s: &str, limit: Option<Duration>)
        -> (Vec<(String, HostTy)>, Vec<(Kind, String)>) {
    let _ = env_logger::try_init();

    let mut source = Source::new();
    let span = source.add(SourceFile::from_string("<test>".into(), s.into()));
    let report = CollectedReport::new(Locale::from("en"));
    let chunk = parse_chunk(&source, span, &report as &Report).expect("parse error");

    let mut session = Session::new(ClassRegistry::new());
    let resolved = run_script(&mut session, &chunk, limit, None, &report as &Report)
        .expect("run_script stopped");

    let resolved = resolved.into_iter()
                           .map(|(_, name, ty)| (name.as_str().to_owned(), ty))
                           .collect();
    let reports = report.into_reports().into_iter()
                        .map(|(kind, _, msg)| (kind, msg))
                        .collect();
    (resolved, reports)
}

fn run(s: &str) -> (Vec<(String, HostTy)>, Vec<(Kind, String)>) {
    run_with_limit(s, Some(Duration::from_secs(5)))
}

fn errors(reports: &[(Kind, String)]) -> Vec<&str> {
    reports.iter()
           .filter(|&&(kind, _)| kind == Kind::Error)
           .map(|&(_, ref msg)| &msg[..])
           .collect()
}

fn notes(reports: &[(Kind, String)]) -> Vec<&str> {
    reports.iter()
           .filter(|&&(kind, _)| kind == Kind::Note)
           .map(|&(_, ref msg)| &msg[..])
           .collect()
}

#[test]
fn test_identity() {
    let (resolved, reports) = run("
        type function Id(t) return t end
        Id(number)
        Id(\"mrrp\")
    ");
    assert_eq!(resolved, vec![("Id".to_owned(), HostTy::Number),
                              ("Id".to_owned(), HostTy::str_singleton("mrrp"))]);
    assert!(reports.is_empty(), "unexpected reports: {:?}", reports);
}

#[test]
fn test_negation_and_union() {
    let (resolved, _) = run("
        type function NotNil(t)
            return types.negationof(t)
        end
        type function Optional(t)
            return types.unionof(t, types.singleton(nil))
        end
        NotNil(string)
        Optional(number)
    ");
    assert_eq!(resolved[0].1, HostTy::Negation(Box::new(HostTy::String)));
    assert_eq!(resolved[1].1, HostTy::Union(vec![HostTy::Number, HostTy::Nil]));
}

#[test]
fn test_duplicate_components_collapse() {
    let (resolved, _) = run("
        type function Dup()
            return types.unionof(types.number, types.number)
        end
        Dup()
    ");
    assert_eq!(resolved[0].1, HostTy::Number);
}

#[test]
fn test_construction_error_is_catchable() {
    let (resolved, reports) = run("
        type function Safe()
            local ok, err = pcall(types.unionof, types.number)
            if ok then return types.never end
            return types.singleton(err)
        end
        Safe()
    ");
    assert_eq!(resolved[0].1, HostTy::str_singleton("expected at least 2 types, got 1"));
    assert!(errors(&reports).is_empty());
}

#[test]
fn test_wrong_return_arity() {
    let (resolved, reports) = run("
        type function Two(t) return t, t end
        type function None_() return end
        Two(number)
        None_()
    ");
    assert_eq!(resolved[0].1, HostTy::Error);
    assert_eq!(resolved[1].1, HostTy::Error);
    let errors = errors(&reports);
    assert!(errors[0].contains("returned 2 values"), "got {:?}", errors[0]);
    assert!(errors[1].contains("returned 0 values"), "got {:?}", errors[1]);
}

#[test]
fn test_failure_degrades_call_site() {
    let (resolved, reports) = run("
        type function Boom()
            error(\"boom\")
        end
        Boom()
    ");
    assert_eq!(resolved, vec![("Boom".to_owned(), HostTy::Error)]);
    let errors = errors(&reports);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("failed") && errors[0].contains("boom"),
            "got {:?}", errors[0]);
}

#[test]
fn test_memoization_runs_body_once_per_argument_tuple() {
    let (resolved, reports) = run("
        type function Loud(t)
            print(\"running\")
            return t
        end
        Loud(number)
        Loud(number)
        Loud(string)
    ");
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[0].1, HostTy::Number);
    assert_eq!(resolved[1].1, HostTy::Number);
    assert_eq!(resolved[2].1, HostTy::String);
    // the second query replays the memoized outcome without rerunning
    assert_eq!(notes(&reports), vec!["running", "running"]);
}

#[test]
fn test_redefinition_does_not_replay_old_outcomes() {
    let report = CollectedReport::new(Locale::from("en"));
    let mut session = Session::new(ClassRegistry::new());
    let mut source = Source::new();

    // one session across several scripts, as a host would drive it;
    // a redefined (and thus dropped) definition must never share a memo
    // entry with any later one
    let scripts = [
        ("type function Pick() return types.number end\nPick()", HostTy::Number),
        ("type function Pick() return types.boolean end\nPick()", HostTy::Boolean),
        ("type function Fresh() return types.string end\nFresh()", HostTy::String),
    ];
    for &(script, ref expected) in &scripts {
        let span = source.add(SourceFile::from_string("<test>".into(), script.into()));
        let chunk = parse_chunk(&source, span, &report as &Report).expect("parse error");
        let resolved = run_script(&mut session, &chunk, None, None, &report as &Report)
            .expect("run_script stopped");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].2, *expected);
    }
}

#[test]
fn test_memoized_failure_is_rereported() {
    let (resolved, reports) = run("
        type function Boom()
            print(\"side effect\")
            error(\"nope\")
        end
        Boom()
        Boom()
    ");
    assert_eq!(resolved[0].1, HostTy::Error);
    assert_eq!(resolved[1].1, HostTy::Error);
    // the body ran once, but both call sites got the diagnostic
    assert_eq!(notes(&reports).len(), 1);
    assert_eq!(errors(&reports).len(), 2);
}

#[test]
fn test_timeout() {
    let (resolved, reports) = run_with_limit("
        type function Spin()
            while true do end
        end
        Spin()
    ", Some(Duration::from_millis(50)));
    assert_eq!(resolved[0].1, HostTy::Error);
    let errors = errors(&reports);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("did not finish in time"), "got {:?}", errors[0]);
}

#[test]
fn test_timeout_is_not_catchable() {
    let (resolved, reports) = run_with_limit("
        type function Spin()
            local ok = pcall(function() while true do end end)
            return types.never
        end
        Spin()
    ", Some(Duration::from_millis(50)));
    // pcall must not swallow the deadline
    assert_eq!(resolved[0].1, HostTy::Error);
    assert!(errors(&reports)[0].contains("did not finish in time"));
}

#[test]
fn test_nested_timeout_poisons_the_enclosing_reduction() {
    let (resolved, reports) = run_with_limit("
        type function Spin()
            while true do end
        end
        type function Outer()
            local ok = pcall(Spin)
            return types.never
        end
        Outer()
    ", Some(Duration::from_millis(50)));
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].1, HostTy::Error);
    let errors = errors(&reports);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("`Outer`"), "got {:?}", errors[0]);
}

#[test]
fn test_nested_reduction() {
    let (resolved, reports) = run("
        type function Optional(t)
            return types.unionof(t, types.singleton(nil))
        end
        type function Deep(t)
            return Optional(t)
        end
        Deep(boolean)
    ");
    assert_eq!(resolved[0].1, HostTy::Union(vec![HostTy::Boolean, HostTy::Nil]));
    assert!(errors(&reports).is_empty());
}

#[test]
fn test_subtype_queries() {
    let script = "
        type function IsStringy(t)
            if t:hasonlysubtypeof(types.string) then
                return types.singleton(true)
            elseif t:hassubtypeof(types.string) then
                return types.unionof(types.singleton(true), types.singleton(false))
            end
            return types.singleton(false)
        end
        IsStringy(number)
        IsStringy(\"mrrp\")
        IsStringy(string)
        IsStringy(union(number, string))
    ";
    let (resolved, _) = run(script);
    assert_eq!(resolved[0].1, HostTy::BoolSingleton(false));
    assert_eq!(resolved[1].1, HostTy::BoolSingleton(true));
    assert_eq!(resolved[2].1, HostTy::BoolSingleton(true));
    assert_eq!(resolved[3].1, HostTy::Union(vec![HostTy::BoolSingleton(true),
                                                 HostTy::BoolSingleton(false)]));
}

#[test]
fn test_table_aliasing_and_copy() {
    let (resolved, reports) = run("
        type function Alias()
            local t = types.newtable()
            local u = t
            u:setproperty(types.singleton(\"x\"), types.number)
            if t:readproperty(types.singleton(\"x\")) == nil then
                error(\"not aliased\")
            end
            local c = t:copy()
            c:setproperty(types.singleton(\"y\"), types.string)
            if t:readproperty(types.singleton(\"y\")) ~= nil then
                error(\"copy leaked\")
            end
            return t
        end
        Alias()
    ");
    assert!(errors(&reports).is_empty(), "got {:?}", reports);
    let mut expected = HostTable::new();
    expected.set_prop(Key::Str("x".into()),
                      HostProp { read: Some(HostTy::Number), write: Some(HostTy::Number) });
    assert_eq!(resolved[0].1, HostTy::Table(Box::new(expected)));
}

#[test]
fn test_rawget() {
    let (resolved, reports) = run("
        type function RawGet(t, k)
            if not t:is(\"table\") then
                error(\"first argument is not a table\")
            end
            local prop = t:readproperty(k)
            if prop == nil then
                return types.singleton(nil)
            end
            return prop
        end
        RawGet({x = number}, \"x\")
        RawGet({x = number}, \"y\")
        RawGet(string, \"x\")
    ");
    assert_eq!(resolved[0].1, HostTy::Number);
    assert_eq!(resolved[1].1, HostTy::Nil);
    assert_eq!(resolved[2].1, HostTy::Error);
    let errors = errors(&reports);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("first argument is not a table"), "got {:?}", errors[0]);
}

#[test]
fn test_function_type_expressions() {
    let (resolved, _) = run("
        type function Id(t) return t end
        Id(func({number, tail = string}, {boolean}))
    ");
    let expected = HostFunc {
        params: HostSeq { head: vec![HostTy::Number],
                          tail: Some(Box::new(HostTy::String)) },
        returns: HostSeq { head: vec![HostTy::Boolean], tail: None },
    };
    assert_eq!(resolved[0].1, HostTy::Function(Box::new(expected)));
}

#[test]
fn test_non_queries_are_rejected() {
    let (resolved, reports) = run("
        local x = 1
        type function Id(t) return t end
        Id(number)
    ");
    assert_eq!(resolved.len(), 1);
    let errors = errors(&reports);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("top level"), "got {:?}", errors[0]);
}

#[test]
fn test_unknown_type_name_in_query() {
    let (resolved, reports) = run("
        type function Id(t) return t end
        Id(numbr)
    ");
    // the argument degrades to the error placeholder, which poisons the call
    assert_eq!(resolved[0].1, HostTy::Error);
    assert!(errors(&reports)[0].contains("not a known type name"));
}

#[test]
fn test_random_is_deterministic_per_reduction() {
    let (resolved, _) = run("
        type function R(t)
            return types.singleton(tostring(math.random(1000000)))
        end
        R(number)
        R(string)
    ");
    // both reductions start from the same seed
    assert_eq!(resolved[0].1, resolved[1].1);
    match resolved[0].1 {
        HostTy::StrSingleton(..) => {}
        ref ty => panic!("unexpected resolution {:?}", ty),
    }
}

#[test]
fn test_class_values_are_read_only_and_walk_parents() {
    let mut classes = ClassRegistry::new();
    let base = classes.register(ClassDef {
        name: "Base".into(), props: Vec::new(), parent: None,
        metatable: None, indexer: None,
    });
    let derived = classes.register(ClassDef {
        name: "Derived".into(), props: Vec::new(), parent: Some(base),
        metatable: None, indexer: None,
    });

    let mut source = Source::new();
    let span = source.add(SourceFile::from_string("<test>".into(), "
        type function Describe(c)
            assert(c:is(\"class\"))
            local ok = pcall(function()
                c:setproperty(types.singleton(\"x\"), types.number)
            end)
            assert(not ok)
            local name = c:name()
            if c:parent() ~= nil then
                name = name .. \" < \" .. c:parent():name()
            end
            return types.singleton(name)
        end
    ".into()));
    let report = CollectedReport::new(Locale::from("en"));
    let chunk = parse_chunk(&source, span, &report as &Report).expect("parse error");

    let mut session = Session::new(classes);
    run_script(&mut session, &chunk, None, None, &report as &Report).expect("stopped");

    // classes enter a reduction only as arguments, so invoke directly
    let governor = Governor::new(None, None);
    let name = Name::from("Describe".to_owned()).without_loc();
    let resolved = session.invoke(&name, &[HostTy::Class(derived)],
                                  &governor, &report as &Report).expect("stopped");
    assert_eq!(resolved, HostTy::str_singleton("Derived < Base"));
    let resolved = session.invoke(&name, &[HostTy::Class(base)],
                                  &governor, &report as &Report).expect("stopped");
    assert_eq!(resolved, HostTy::str_singleton("Base"));
}

#[test]
fn test_sandbox_stdlib() {
    let (resolved, reports) = run("
        type function Lib()
            local parts = {}
            for i, v in ipairs({ \"a\", \"b\", \"c\" }) do
                table.insert(parts, string.upper(v) .. i)
            end
            local joined = table.concat(parts, \"-\")
            assert(#joined == 8)
            assert(string.sub(joined, 1, 2) == \"A1\")
            assert(math.max(1, 2, 3) == math.floor(3.5))
            assert(select(\"#\", 1, 2, 3) == 3)
            return types.singleton(joined)
        end
        Lib()
    ");
    assert!(errors(&reports).is_empty(), "got {:?}", reports);
    assert_eq!(resolved[0].1, HostTy::str_singleton("A1-B2-C3"));
}
