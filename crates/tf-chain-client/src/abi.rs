use alloy_sol_types::sol;

sol! {
    #[derive(Debug)]
    interface ITIP20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function hasRole(bytes32 role, address account) external view returns (bool);

        function transfer(address to, uint256 amount) external returns (bool);
        function transferWithMemo(address to, uint256 amount, bytes32 memo) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function mint(address to, uint256 amount) external;
        function grantRole(bytes32 role, address account) external;
    }

    #[derive(Debug)]
    interface ITIP20Factory {
        function createToken(
            string name,
            string symbol,
            string currency,
            address quoteToken,
            address admin,
            bytes32 salt
        ) external returns (address);

        event TokenCreated(
            address indexed token,
            string name,
            string symbol,
            string currency,
            address quoteToken,
            address admin,
            bytes32 salt
        );
    }

    #[derive(Debug)]
    interface IStablecoinDex {
        function swapExactAmountIn(
            address tokenIn,
            address tokenOut,
            uint128 amountIn,
            uint128 minAmountOut
        ) external returns (uint128 amountOut);

        function quoteSwapExactAmountIn(
            address tokenIn,
            address tokenOut,
            uint128 amountIn
        ) external view returns (uint128 amountOut);
    }
}
