use lex::Tok;
use tyfun_diag::Localize;

define_msg! { pub NoFileForSpan:
    "ko" => "주어진 코드 범위에 대응하는 소스 파일이 존재하지 않습니다",
    _    => "There exists no source file corresponding to given span",
}

// lexer messages

define_msg! { pub PrematureEofInString:
    "ko" => "문자열을 읽던 중 파일이 끝났습니다",
    _    => "Premature end of file in a string",
}

define_msg! { pub UnclosedOpeningLongBracket:
    "ko" => "긴 문자열을 여는 `[`가 제대로 닫히지 않았습니다",
    _    => "Opening long bracket should end with `[`",
}

define_msg! { pub PrematureEofInLongString:
    "ko" => "긴 문자열을 읽던 중 파일이 끝났습니다",
    _    => "Premature end of file in a long string",
}

define_msg! { pub PrematureEofInLongComment:
    "ko" => "긴 주석을 읽던 중 파일이 끝났습니다",
    _    => "Premature end of file in a long comment",
}

define_msg! { pub UnrecognizedEscapeInString:
    "ko" => "문자열 안에 알 수 없는 탈출열이 있습니다",
    _    => "Unrecognized escape sequence in a string",
}

define_msg! { pub StringStart:
    "ko" => "문자열 리터럴은 여기서 시작되었습니다",
    _    => "The string started here",
}

define_msg! { pub LongBracketStart:
    "ko" => "긴 괄호는 여기서 시작되었습니다",
    _    => "The long bracket started here",
}

define_msg! { pub InvalidNumber:
    "ko" => "숫자 형식이 잘못되었습니다",
    _    => "Invalid number",
}

define_msg! { pub UnexpectedChar:
    "ko" => "알 수 없는 문자가 나왔습니다",
    _    => "Unexpected character",
}

// parser messages

define_msg! { pub ExpectFailed<'a> { expected: &'a Localize, read: &'a Tok }:
    "ko" => "{expected}이(가) 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected {expected}, got {read}",
}

define_msg! { pub NoName<'a> { read: &'a Tok }:
    "ko" => "이름이 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected a name, got {read}",
}

define_msg! { pub NoExp<'a> { read: &'a Tok }:
    "ko" => "수식이 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected an expression, got {read}",
}

define_msg! { pub NoVar<'a> { read: &'a Tok }:
    "ko" => "변수나 인덱스 수식이 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected a left-hand-side expression, got {read}",
}

define_msg! { pub NoVarButCall:
    "ko" => "변수나 인덱스 수식이 나와야 하는데 함수 호출이 나왔습니다",
    _    => "Expected a left-hand-side expression, got a function call",
}

define_msg! { pub NoTableSep<'a> { read: &'a Tok }:
    "ko" => "`,`, `;`이나 `}}`가 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected `,`, `;` or `}}`, got {read}",
}

define_msg! { pub NoFuncArgs<'a> { read: &'a Tok }:
    "ko" => "함수 인자가 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected argument(s), got {read}",
}

define_msg! { pub NoStmtAfterReturnOrBreak:
    "ko" => "`return`이나 `break` 문 뒤에는 다른 문장이 올 수 없습니다",
    _    => "`return` or `break` cannot be followed by other statements",
}

define_msg! { pub NoTypeFuncName<'a> { read: &'a Tok }:
    "ko" => "`type function` 뒤에 이름이 나와야 하는데 {read}이(가) 나왔습니다",
    _    => "Expected a name after `type function`, got {read}",
}

define_msg! { pub TypeFuncNotAtTopLevel:
    "ko" => "`type function` 선언은 최상위 레벨에서만 쓸 수 있습니다",
    _    => "`type function` declarations are only allowed at the top level",
}
