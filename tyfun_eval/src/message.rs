use tyfun_syntax::Name;

define_msg! { pub ReductionFailure<'a> { name: &'a Name, msg: &'a str }:
    "ko" => "타입 함수 {name}의 실행이 실패했습니다: {msg}",
    _    => "The type function {name} failed: {msg}",
}

define_msg! { pub ReductionTimeout<'a> { name: &'a Name }:
    "ko" => "타입 함수 {name}의 실행이 제한 시간을 초과했습니다",
    _    => "The type function {name} did not finish in time",
}

define_msg! { pub ReductionCanceled<'a> { name: &'a Name }:
    "ko" => "타입 함수 {name}의 실행이 취소되었습니다",
    _    => "The type function {name} was canceled",
}

define_msg! { pub MalformedResult<'a> { name: &'a Name, detail: &'a str }:
    "ko" => "타입 함수 {name}가 잘못된 타입을 반환했습니다: {detail}",
    _    => "The type function {name} returned a malformed type: {detail}",
}

define_msg! { pub ReturnArity<'a> { name: &'a Name, given: usize }:
    "ko" => "타입 함수 {name}는 타입 하나를 반환해야 하는데 {given}개의 값을 반환했습니다",
    _    => "The type function {name} should return a single type \
             but returned {given} values",
}

define_msg! { pub PrintNote<'a> { msg: &'a str }:
    _ => "{msg}",
}

define_msg! { pub UndefinedTypeFunc<'a> { name: &'a Name }:
    "ko" => "{name}이라는 타입 함수가 정의되지 않았습니다",
    _    => "No type function named {name} is defined",
}

define_msg! { pub NotAQuery:
    "ko" => "최상위에는 타입 함수 선언과 타입 함수 호출만 올 수 있습니다",
    _    => "Only type function declarations and type function calls \
             are allowed at the top level",
}

define_msg! { pub NotATypeExp:
    "ko" => "타입 표현식이 아닙니다",
    _    => "This is not a recognized type expression",
}

define_msg! { pub UnknownTypeName<'a> { name: &'a Name }:
    "ko" => "{name}은 알려진 타입 이름이 아닙니다",
    _    => "{name} is not a known type name",
}
